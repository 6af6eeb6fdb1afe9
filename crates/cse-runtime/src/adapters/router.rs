//! CSE request router.
//!
//! Decides per request whether it is a group operation, whether it must be
//! parked on a polling channel, or whether the CSE answers it itself.

use async_trait::async_trait;
use cse_01_polling_channel::{ChannelTarget, PollingChannelApi, PollingChannelService};
use cse_02_group_fanout::{FanOutAddress, GroupFanOutApi, GroupFanOutService};
use serde_json::{json, Value};
use shared_types::{
    AccessControlGate, DeliveryError, DeliveryResult, M2mRequest, M2mResponse, Operation,
    Originator, RequestRouter, ResourceDirectory, ResourceId, ResourceKind, ResponseStatusCode,
};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

use super::directory::{DirectoryEntry, InMemoryDirectory};

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Group,
    Polling(ChannelTarget),
    Local,
}

pub struct CseRouter {
    cse_id: Originator,
    directory: Arc<InMemoryDirectory>,
    access: Arc<dyn AccessControlGate>,
    polling: Arc<PollingChannelService>,
    /// Set once after construction; fan-out owns the router, so this side
    /// stays weak.
    fanout: OnceLock<Weak<GroupFanOutService>>,
}

impl CseRouter {
    pub fn new(
        cse_id: Originator,
        directory: Arc<InMemoryDirectory>,
        access: Arc<dyn AccessControlGate>,
        polling: Arc<PollingChannelService>,
    ) -> Self {
        Self {
            cse_id,
            directory,
            access,
            polling,
            fanout: OnceLock::new(),
        }
    }

    /// Returns false if a fan-out service was already attached.
    pub fn attach_fanout(&self, fanout: &Arc<GroupFanOutService>) -> bool {
        self.fanout.set(Arc::downgrade(fanout)).is_ok()
    }

    pub fn cse_id(&self) -> &Originator {
        &self.cse_id
    }

    /// Route `request` and always produce a response; failures become their
    /// status code.
    pub async fn handle(&self, request: M2mRequest) -> M2mResponse {
        let request_id = request.request_id.clone();
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                debug!(request_id = %request_id, error = %err, "Request failed");
                M2mResponse::new(request_id, err.status_code(), self.cse_id.clone())
                    .with_payload(json!({ "error": err.to_string() }))
            }
        }
    }

    async fn route(&self, to: &ResourceId) -> Route {
        let address = FanOutAddress::parse(to);
        if address.group != *to
            || self.directory.resource_kind(to).await == Some(ResourceKind::Group)
        {
            return Route::Group;
        }

        match self.directory.owning_entity(to) {
            Some((entity, originator, false)) => {
                Route::Polling(ChannelTarget::new(entity, originator))
            }
            _ => Route::Local,
        }
    }

    fn fanout(&self) -> DeliveryResult<Arc<GroupFanOutService>> {
        self.fanout
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| DeliveryError::Dispatch("group fan-out is not available".into()))
    }

    async fn authorize(&self, request: &M2mRequest) -> DeliveryResult<()> {
        let decision = self
            .access
            .check(&request.from, &request.to, request.operation.permission())
            .await;
        if decision.is_allowed() {
            Ok(())
        } else {
            Err(DeliveryError::PermissionDenied {
                originator: request.from.clone(),
                target: request.to.clone(),
            })
        }
    }

    async fn handle_locally(&self, request: M2mRequest) -> DeliveryResult<M2mResponse> {
        self.authorize(&request).await?;

        let respond = |status: ResponseStatusCode, payload: Value| {
            M2mResponse::new(request.request_id.clone(), status, self.cse_id.clone())
                .with_payload(payload)
        };
        let not_found = || DeliveryError::NotFound(request.to.to_string());

        let response = match request.operation {
            Operation::Create => {
                if !self.directory.contains(&request.to) {
                    return Err(not_found());
                }
                let name = request
                    .payload
                    .get("rn")
                    .and_then(Value::as_str)
                    .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
                let id = request.to.join(&name);
                if self.directory.contains(&id) {
                    return Err(DeliveryError::Dispatch(format!("{id} already exists")));
                }
                self.directory.put_content(id.clone(), request.payload.clone());
                respond(ResponseStatusCode::Created, json!({ "ri": id }))
            }
            Operation::Retrieve => match self.directory.get(&request.to).ok_or_else(not_found)? {
                DirectoryEntry::Content { value } => respond(ResponseStatusCode::Ok, value),
                DirectoryEntry::Entity {
                    originator,
                    reachable,
                } => respond(
                    ResponseStatusCode::Ok,
                    json!({ "aei": originator, "rr": reachable }),
                ),
                DirectoryEntry::Group { members } => {
                    respond(ResponseStatusCode::Ok, json!({ "mid": members }))
                }
            },
            Operation::Update => match self.directory.get(&request.to).ok_or_else(not_found)? {
                DirectoryEntry::Content { .. } => {
                    self.directory
                        .put_content(request.to.clone(), request.payload.clone());
                    respond(ResponseStatusCode::Updated, request.payload.clone())
                }
                _ => {
                    return Err(DeliveryError::Dispatch(format!(
                        "{} cannot be updated",
                        request.to
                    )))
                }
            },
            Operation::Delete => {
                self.directory.remove(&request.to).ok_or_else(not_found)?;
                respond(ResponseStatusCode::Deleted, Value::Null)
            }
            Operation::Notify | Operation::Discovery => {
                if !self.directory.contains(&request.to) {
                    return Err(not_found());
                }
                respond(ResponseStatusCode::Ok, Value::Null)
            }
        };
        Ok(response)
    }
}

#[async_trait]
impl RequestRouter for CseRouter {
    async fn dispatch(&self, request: M2mRequest) -> DeliveryResult<M2mResponse> {
        match self.route(&request.to).await {
            Route::Group => {
                let aggregated = self.fanout()?.handle_group_request(request).await?;
                Ok(aggregated.into_response(self.cse_id.clone()))
            }
            Route::Polling(target) => {
                self.authorize(&request).await?;
                debug!(
                    target_id = %target.resource_id,
                    request_id = %request.request_id,
                    "Target is not reachable, using its polling channel"
                );
                self.polling.submit_async(&target, request, None).await
            }
            Route::Local => {
                let operation = request.operation;
                let to = request.to.clone();
                let response = self.handle_locally(request).await;
                if let Err(err) = &response {
                    warn!(operation = %operation, target_id = %to, error = %err, "Local handling failed");
                }
                response
            }
        }
    }
}
