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

//! Operations on the collection of resources.

use crate::db;
use crate::driver::Driver;
use crate::model::{NewResource, PageRequest, Pagination, Resource, ResourcePage};
use crud_core::driver::DriverResult;

impl Driver {
    /// Creates a new resource from the client-provided contents in `new`.
    pub(crate) async fn create_resource(self, new: NewResource) -> DriverResult<Resource> {
        let (name, description) = new.dissolve();
        let now = self.clock.now_utc();

        let mut ex = self.db.ex().await?;
        let resource = db::create_resource(&mut ex, &name, description.as_ref(), now).await?;
        Ok(resource)
    }

    /// Gets the resources in `page`, optionally restricted to those whose name is exactly
    /// `name`, along with the pagination details of the whole matching set.
    ///
    /// The page and the total count are fetched concurrently, each on its own connection, so they
    /// may disagree if the collection is modified at the same time.  Each query releases its
    /// connection as soon as it completes, which lets both run even on a one-connection pool.
    pub(crate) async fn list_resources(
        self,
        name: Option<String>,
        page: PageRequest,
    ) -> DriverResult<ResourcePage> {
        let name = name.as_deref();

        let (data, total) = futures::try_join!(
            async {
                let mut ex = self.db.ex().await?;
                db::list_resources(&mut ex, name, &page).await
            },
            async {
                let mut ex = self.db.ex().await?;
                db::count_resources(&mut ex, name).await
            },
        )?;

        Ok(ResourcePage::new(data, Pagination::new(total, &page)))
    }
}
