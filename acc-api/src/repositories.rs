use crate::endpoints::{hubs::ListHubs, photos::FilterPhotos, projects::ListProjects};

pub struct HubRepository;

impl HubRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn list(&self) -> ListHubs {
        ListHubs
    }
}

#[derive(Default)]
pub struct ProjectRepository {
    hub_id: String,
}

impl ProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hub(mut self, hub_id: impl Into<String>) -> Self {
        self.hub_id = hub_id.into();
        self
    }

    pub fn list(&self) -> ListProjects {
        ListProjects::new(self.hub_id.clone())
    }
}

#[derive(Default)]
pub struct PhotoRepository {
    project_id: String,
}

impl PhotoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn filter(&self) -> FilterPhotos {
        FilterPhotos::new(self.project_id.clone())
    }
}
