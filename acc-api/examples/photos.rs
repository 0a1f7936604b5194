use acc_api::{AccApiError, Client, Request};

#[tokio::main]
pub async fn main() -> Result<(), AccApiError> {
    let client = Client::new("access_token");

    let hubs = client.send(Request::hubs().list()).await?.into_named();
    for hub in hubs {
        let projects = client
            .send(Request::projects().with_hub(&hub.id).list())
            .await?
            .into_named();
        for project in projects {
            let photos = client
                .photos(Request::photos().with_project(&project.id).filter())
                .await?;
            println!("{} / {}: {} photos", hub.name, project.name, photos.len());
        }
    }
    Ok(())
}
