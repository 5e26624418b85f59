//! The gRPC endpoint: three unary RPCs forwarding into [`Shared`].
//! Mirrors the teacher's `proxy::server::Communicator<F>` — a thin
//! `tonic::async_trait` impl that never holds the state lock across
//! an I/O boundary, matching §4.3.3's ordering guarantees.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{info, warn};

use fl_core::model;

use crate::state::Shared;

pub mod proto {
    tonic::include_proto!("fl_aggregation");
}

use proto::aggregation_server::Aggregation as AggregationRpc;
pub use proto::aggregation_server::AggregationServer;
use proto::{
    GetLatestModelRequest, GetLatestModelResponse, JoinRequest, JoinResponse,
    SubmitUpdateRequest, SubmitUpdateResponse,
};

#[derive(Clone)]
pub struct AggregationService {
    shared: Arc<Shared>,
}

impl AggregationService {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn into_server(self) -> AggregationServer<Self> {
        AggregationServer::new(self)
    }
}

#[tonic::async_trait]
impl AggregationRpc for AggregationService {
    /// Returns the current global model. Idempotent: never mutates
    /// state beyond logging.
    async fn join(
        &self,
        request: Request<JoinRequest>,
    ) -> Result<Response<JoinResponse>, Status> {
        let collaborator_id = request.into_inner().collaborator_id;
        let (global, _round) = self.shared.snapshot().await;
        info!(collaborator_id, "collaborator joined the federation");
        Ok(Response::new(JoinResponse {
            model_bytes: model::encode(&global),
        }))
    }

    /// Enqueues a locally trained update. Fails the RPC on a byte
    /// length that isn't `4N`; the update is discarded and the round
    /// is unaffected.
    async fn submit_update(
        &self,
        request: Request<SubmitUpdateRequest>,
    ) -> Result<Response<SubmitUpdateResponse>, Status> {
        let req = request.into_inner();
        let weights = model::decode(&req.model_bytes).map_err(|err| {
            warn!(collaborator_id = %req.collaborator_id, %err, "rejected malformed update");
            Status::invalid_argument(err.to_string())
        })?;
        model::check_len(&weights, self.shared.model_size).map_err(|err| {
            warn!(collaborator_id = %req.collaborator_id, %err, "rejected malformed update");
            Status::invalid_argument(err.to_string())
        })?;

        let num_samples = if req.num_samples > 0 { Some(req.num_samples) } else { None };
        let learning_rate = if req.learning_rate > 0.0 { Some(req.learning_rate) } else { None };
        let round = self
            .shared
            .submit(req.collaborator_id.clone(), weights, num_samples, learning_rate)
            .await;
        info!(collaborator_id = %req.collaborator_id, round, "accepted update");

        Ok(Response::new(SubmitUpdateResponse { success: true }))
    }

    /// Returns a snapshot of the current global model and round
    /// counter; safe to call concurrently with aggregation.
    async fn get_latest_model(
        &self,
        request: Request<GetLatestModelRequest>,
    ) -> Result<Response<GetLatestModelResponse>, Status> {
        let collaborator_id = request.into_inner().collaborator_id;
        let (global, round) = self.shared.snapshot().await;
        info!(collaborator_id, round, "served latest model snapshot");
        Ok(Response::new(GetLatestModelResponse {
            model_bytes: model::encode(&global),
            current_round: round.min(i32::MAX as u32) as i32,
        }))
    }
}
