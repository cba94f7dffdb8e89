use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;

use conn_slo::{errors, Result};

use crate::{now, List, State};

use super::{
    into_page, ConnectorResource, ConnectorResourceStore, ListOpts,
    UpdateOpts,
};

/// Process local store keyed by uid. Deleted records are dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    resources: RwLock<HashMap<String, ConnectorResource>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find_mut<'a>(
    resources: &'a mut HashMap<String, ConnectorResource>,
    owner: &str,
    id: &str,
) -> Result<&'a mut ConnectorResource> {
    resources
        .values_mut()
        .find(|v| v.owner == owner && v.id == id)
        .ok_or_else(|| {
            errors::not_found(&format!("connector resource {}", id))
        })
}

#[async_trait]
impl ConnectorResourceStore for MemoryStore {
    async fn create_connector_resource(
        &self,
        input: &ConnectorResource,
    ) -> Result<()> {
        let mut resources = self.resources.write().map_err(errors::any)?;
        if resources
            .values()
            .any(|v| v.owner == input.owner && v.id == input.id)
        {
            return Err(errors::already_exists(&format!(
                "connector resource {}",
                input.id
            )));
        }
        if resources.contains_key(&input.uid) {
            return Err(errors::already_exists(&format!(
                "connector resource uid {}",
                input.uid
            )));
        }
        resources.insert(input.uid.clone(), input.clone());
        Ok(())
    }

    async fn get_connector_resource(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<ConnectorResource> {
        let resources = self.resources.read().map_err(errors::any)?;
        resources
            .values()
            .find(|v| v.owner == owner && v.id == id)
            .cloned()
            .ok_or_else(|| {
                errors::not_found(&format!("connector resource {}", id))
            })
    }

    async fn get_connector_resource_by_uid(
        &self,
        uid: &str,
        owner: Option<String>,
    ) -> Result<ConnectorResource> {
        let resources = self.resources.read().map_err(errors::any)?;
        resources
            .get(uid)
            .filter(|v| owner.as_ref().map_or(true, |o| &v.owner == o))
            .cloned()
            .ok_or_else(|| {
                errors::not_found(&format!("connector resource uid {}", uid))
            })
    }

    async fn list_connector_resources(
        &self,
        opts: &ListOpts,
    ) -> Result<List<ConnectorResource>> {
        let resources = self.resources.read().map_err(errors::any)?;
        let mut matched: Vec<&ConnectorResource> =
            resources.values().filter(|v| opts.matches(v)).collect();
        matched.sort_by(|a, b| {
            (a.create_time, &a.uid).cmp(&(b.create_time, &b.uid))
        });
        let total_size = matched.len() as i64;

        let rows = matched
            .into_iter()
            .filter(|v| {
                opts.cursor
                    .as_ref()
                    .map_or(true, |c| c.precedes(&v.create_time, &v.uid))
            })
            .cloned();
        let rows: Vec<ConnectorResource> = if opts.page_size > 0 {
            rows.take(opts.page_size as usize + 1).collect()
        } else {
            rows.collect()
        };
        Ok(into_page(rows, opts.page_size, total_size))
    }

    async fn update_connector_resource(
        &self,
        owner: &str,
        id: &str,
        opts: &UpdateOpts,
    ) -> Result<ConnectorResource> {
        let mut resources = self.resources.write().map_err(errors::any)?;
        let resource = find_mut(&mut resources, owner, id)?;
        if let Some(description) = &opts.description {
            resource.description = description.clone();
        }
        if let Some(configuration) = &opts.configuration {
            resource.configuration = configuration.clone();
        }
        resource.update_time = now();
        Ok(resource.clone())
    }

    async fn update_connector_resource_id(
        &self,
        owner: &str,
        id: &str,
        new_id: &str,
    ) -> Result<ConnectorResource> {
        let mut resources = self.resources.write().map_err(errors::any)?;
        if id != new_id
            && resources
                .values()
                .any(|v| v.owner == owner && v.id == new_id)
        {
            return Err(errors::already_exists(&format!(
                "connector resource {}",
                new_id
            )));
        }
        let resource = find_mut(&mut resources, owner, id)?;
        resource.id = new_id.to_owned();
        resource.update_time = now();
        Ok(resource.clone())
    }

    async fn update_connector_resource_state(
        &self,
        uid: &str,
        state: State,
    ) -> Result<()> {
        let mut resources = self.resources.write().map_err(errors::any)?;
        let resource = resources.get_mut(uid).ok_or_else(|| {
            errors::not_found(&format!("connector resource uid {}", uid))
        })?;
        resource.state = state;
        resource.update_time = now();
        Ok(())
    }

    async fn tombstone_connector_resources(
        &self,
        connector_definition_id: &str,
    ) -> Result<u64> {
        let mut resources = self.resources.write().map_err(errors::any)?;
        let mut changed = 0;
        for resource in resources.values_mut().filter(|v| {
            v.connector_definition_id == connector_definition_id
                && !v.tombstone
        }) {
            resource.tombstone = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_connector_resource(
        &self,
        owner: &str,
        id: &str,
    ) -> Result<()> {
        let mut resources = self.resources.write().map_err(errors::any)?;
        let uid = find_mut(&mut resources, owner, id)?.uid.clone();
        resources.remove(&uid);
        Ok(())
    }
}
