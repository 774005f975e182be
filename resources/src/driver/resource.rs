// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Operations on one resource.

use crate::db;
use crate::driver::Driver;
use crate::model::{Resource, ResourceId, ResourcePatch};
use crud_core::driver::DriverResult;

impl Driver {
    /// Deletes the resource identified by `id`.
    pub(crate) async fn delete_resource(self, id: ResourceId) -> DriverResult<()> {
        let mut ex = self.db.ex().await?;
        db::delete_resource(&mut ex, id).await?;
        Ok(())
    }

    /// Gets the resource identified by `id`.
    pub(crate) async fn get_resource(self, id: ResourceId) -> DriverResult<Resource> {
        let mut ex = self.db.ex().await?;
        let resource = db::get_resource(&mut ex, id).await?;
        Ok(resource)
    }

    /// Applies `patch` to the resource identified by `id` and returns its new state.
    ///
    /// Fields absent from the patch keep their stored values.  The modification time never goes
    /// backwards even if the clock does.
    pub(crate) async fn update_resource(
        self,
        id: ResourceId,
        patch: ResourcePatch,
    ) -> DriverResult<Resource> {
        let mut tx = self.db.begin().await?;
        let current = db::get_resource(tx.ex(), id).await?;

        let (name, description) = patch.dissolve();
        let name = name.unwrap_or_else(|| current.name().clone());
        let description = description.unwrap_or_else(|| current.description().clone());
        let updated_at = std::cmp::max(self.clock.now_utc(), *current.updated_at());

        db::update_resource(tx.ex(), id, &name, description.as_ref(), updated_at).await?;
        tx.commit().await?;

        Ok(Resource::new(id, name, description, *current.created_at(), updated_at))
    }
}
