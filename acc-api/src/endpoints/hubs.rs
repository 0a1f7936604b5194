use super::{EntriesResponse, Named};
use std::borrow::Cow;
use tower_api_client::Request;

pub type Hub = Named;

#[derive(Default, Debug, Clone)]
pub struct ListHubs;

impl Request for ListHubs {
    type Data = ();
    type Response = EntriesResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        "/project/v1/hubs".into()
    }
}
