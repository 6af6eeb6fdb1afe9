//! Group Fan-Out Service - expands group operations over their members.

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use shared_types::{
    AccessControlGate, DeliveryError, DeliveryResult, M2mRequest, Operation, Originator,
    RequestRouter, ResourceDirectory, ResourceId, ResourceKind,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::domain::{
    AggregatedResponse, FanOutAddress, FanOutConfig, FanOutJob, MemberResult, SlotStatus,
};
use crate::ports::GroupFanOutApi;

/// Statistics for the fan-out service
#[derive(Debug, Default)]
pub struct FanOutStats {
    pub total_jobs: AtomicU64,
    /// Jobs answered with `MixedResponses`.
    pub total_mixed: AtomicU64,
    pub total_members_dispatched: AtomicU64,
    pub total_members_failed: AtomicU64,
    pub total_members_timed_out: AtomicU64,
    pub total_rejected_too_deep: AtomicU64,
}

/// Group fan-out service.
pub struct GroupFanOutService {
    directory: Arc<dyn ResourceDirectory>,
    access: Arc<dyn AccessControlGate>,
    router: Arc<dyn RequestRouter>,
    /// Bounds leaf dispatches across all jobs. Nested groups never hold a
    /// permit while their own members wait for one.
    workers: Arc<Semaphore>,
    config: FanOutConfig,
    stats: Arc<FanOutStats>,
}

impl GroupFanOutService {
    pub fn new(
        config: FanOutConfig,
        directory: Arc<dyn ResourceDirectory>,
        access: Arc<dyn AccessControlGate>,
        router: Arc<dyn RequestRouter>,
    ) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(config.max_concurrent_dispatches)),
            directory,
            access,
            router,
            config,
            stats: Arc::new(FanOutStats::default()),
        }
    }

    pub fn config(&self) -> &FanOutConfig {
        &self.config
    }

    pub fn stats(&self) -> &FanOutStats {
        &self.stats
    }

    /// Permits currently free in the worker pool.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// One fan-out level. Boxed because nested groups recurse into it.
    fn fan_out<'a>(
        &'a self,
        request: &'a M2mRequest,
        address: FanOutAddress,
        depth: u8,
        deadline: Instant,
    ) -> BoxFuture<'a, DeliveryResult<AggregatedResponse>> {
        async move {
            if depth > self.config.max_depth {
                self.stats
                    .total_rejected_too_deep
                    .fetch_add(1, Ordering::Relaxed);
                warn!(
                    group = %address.group,
                    depth = depth,
                    limit = self.config.max_depth,
                    "Nested fan-out exceeds depth limit"
                );
                return Err(DeliveryError::FanOutTooDeep {
                    depth,
                    limit: self.config.max_depth,
                });
            }

            let members = self.directory.resolve_members(&address.group).await?;
            if members.is_empty() {
                return Err(DeliveryError::NotFound(format!(
                    "group {} has no members",
                    address.group
                )));
            }

            let mut job = FanOutJob::new(
                request.request_id.clone(),
                request.operation,
                deadline,
                depth,
                members,
            );
            self.stats.total_jobs.fetch_add(1, Ordering::Relaxed);
            debug!(
                group = %address.group,
                parent_request_id = %job.parent_request_id,
                members = job.len(),
                depth = depth,
                "Starting fan-out job"
            );

            let dispatches: Vec<_> = job
                .slots()
                .iter()
                .enumerate()
                .map(|(index, slot)| {
                    let sub_request = request.readdressed(
                        address.member_target(&slot.member_id),
                        slot.sub_request_id.clone(),
                    );
                    let member = slot.member_id.clone();
                    let parent = &address;
                    async move {
                        let result = self
                            .dispatch_member(parent, &member, sub_request, depth, deadline)
                            .await;
                        (index, result)
                    }
                })
                .collect();

            for (index, result) in join_all(dispatches).await {
                job.record(index, result);
            }
            job.expire_pending();

            let aggregated = AggregatedResponse::from_job(&job);
            self.record_outcome(&address.group, &aggregated);
            Ok(aggregated)
        }
        .boxed()
    }

    /// Dispatch one member, bounded by the job deadline.
    ///
    /// A member that is a group, or a fan-out point of one, is fanned out in
    /// turn one level deeper under the same deadline.
    async fn dispatch_member(
        &self,
        parent: &FanOutAddress,
        member: &ResourceId,
        sub_request: M2mRequest,
        depth: u8,
        deadline: Instant,
    ) -> MemberResult {
        let nested = parent.nested(member);
        if nested.group != *member
            || self.directory.resource_kind(member).await == Some(ResourceKind::Group)
        {
            return self.dispatch_nested(nested, sub_request, depth, deadline).await;
        }

        let workers = self.workers.clone();
        let router = self.router.clone();
        let dispatch = async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| DeliveryError::Dispatch("worker pool closed".into()))?;
            router.dispatch(sub_request).await
        };

        self.stats
            .total_members_dispatched
            .fetch_add(1, Ordering::Relaxed);
        match timeout_at(deadline, dispatch).await {
            Ok(result) => result.into(),
            Err(_) => MemberResult::DeadlineElapsed,
        }
    }

    async fn dispatch_nested(
        &self,
        nested: FanOutAddress,
        sub_request: M2mRequest,
        depth: u8,
        deadline: Instant,
    ) -> MemberResult {
        let decision = self
            .access
            .check(&sub_request.from, &nested.group, sub_request.operation.permission())
            .await;
        if !decision.is_allowed() {
            warn!(
                group = %nested.group,
                originator = %sub_request.from,
                operation = %sub_request.operation,
                "Nested group rejected by access control"
            );
            return MemberResult::Error(DeliveryError::PermissionDenied {
                originator: sub_request.from.clone(),
                target: nested.group,
            });
        }

        let from = Originator::new(nested.group.as_str());
        let fan_out = self.fan_out(&sub_request, nested, depth + 1, deadline);
        match timeout_at(deadline, fan_out).await {
            Ok(Ok(aggregated)) => MemberResult::Replied(aggregated.into_response(from)),
            Ok(Err(err)) => MemberResult::Error(err),
            Err(_) => MemberResult::DeadlineElapsed,
        }
    }

    fn record_outcome(&self, group: &ResourceId, aggregated: &AggregatedResponse) {
        let failed = aggregated.count(SlotStatus::Failed);
        let timed_out = aggregated.count(SlotStatus::TimedOut);
        self.stats
            .total_members_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
        self.stats
            .total_members_timed_out
            .fetch_add(timed_out as u64, Ordering::Relaxed);

        if aggregated.is_mixed() {
            self.stats.total_mixed.fetch_add(1, Ordering::Relaxed);
            info!(
                group = %group,
                parent_request_id = %aggregated.parent_request_id,
                completed = aggregated.count(SlotStatus::Completed),
                failed = failed,
                timed_out = timed_out,
                "Fan-out finished with mixed responses"
            );
        } else {
            debug!(
                group = %group,
                parent_request_id = %aggregated.parent_request_id,
                status = %aggregated.status,
                "Fan-out finished"
            );
        }
    }
}

#[async_trait]
impl GroupFanOutApi for GroupFanOutService {
    async fn handle_group_operation(
        &self,
        address: &ResourceId,
        operation: Operation,
        payload: Value,
        originator: &Originator,
    ) -> DeliveryResult<AggregatedResponse> {
        let request =
            M2mRequest::new(operation, address.clone(), originator.clone()).with_payload(payload);
        self.handle_group_request(request).await
    }

    async fn handle_group_request(&self, request: M2mRequest) -> DeliveryResult<AggregatedResponse> {
        let address = FanOutAddress::parse(&request.to);

        let decision = self
            .access
            .check(&request.from, &address.group, request.operation.permission())
            .await;
        if !decision.is_allowed() {
            warn!(
                group = %address.group,
                originator = %request.from,
                operation = %request.operation,
                "Group operation rejected by access control"
            );
            return Err(DeliveryError::PermissionDenied {
                originator: request.from.clone(),
                target: address.group,
            });
        }

        let now = Instant::now();
        let job_deadline = now + self.config.job_timeout();
        let deadline = request
            .expires_in()
            .map_or(job_deadline, |expires_in| job_deadline.min(now + expires_in));

        self.fan_out(&request, address, 0, deadline).await
    }
}
