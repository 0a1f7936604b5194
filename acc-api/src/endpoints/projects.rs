use super::{EntriesResponse, Named};
use crate::macros::setter;
use std::borrow::Cow;
use tower_api_client::Request;

pub type Project = Named;

#[derive(Default, Debug, Clone)]
pub struct ListProjects {
    hub_id: String,
}

impl ListProjects {
    pub fn new(hub_id: impl Into<String>) -> Self {
        Self {
            hub_id: hub_id.into(),
        }
    }

    setter!(hub_id: String);
}

impl Request for ListProjects {
    type Data = ();
    type Response = EntriesResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        format!(
            "/project/v1/hubs/{}/projects",
            urlencoding::encode(&self.hub_id)
        )
        .into()
    }
}
