//! The gRPC client wrapper, matching the teacher's `client-sdk`
//! `client::grpc::GRPCClient` shape: a thin handle around a generated
//! `*Client<Channel>` exposing the three unary RPCs as plain methods.

use std::time::Duration;

use tonic::transport::Channel;

use crate::error::ClientError;

pub mod proto {
    tonic::include_proto!("fl_aggregation");
}

use proto::aggregation_client::AggregationClient;
use proto::{GetLatestModelRequest, JoinRequest, SubmitUpdateRequest};

/// Per-call deadline for `submit_update`, per §4.4.
const SUBMIT_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Client {
    collaborator_id: String,
    inner: AggregationClient<Channel>,
}

impl Client {
    /// Opens a transport connection to the aggregator and returns a
    /// handle ready to issue RPCs as `collaborator_id`.
    pub async fn connect(
        collaborator_id: impl Into<String>,
        aggregator_address: &str,
    ) -> Result<Self, ClientError> {
        let endpoint = if aggregator_address.starts_with("http") {
            aggregator_address.to_string()
        } else {
            format!("http://{aggregator_address}")
        };
        let inner = AggregationClient::connect(endpoint).await?;
        Ok(Self {
            collaborator_id: collaborator_id.into(),
            inner,
        })
    }

    /// Issues `Join`, returning the current global model's bytes.
    pub async fn join(&mut self) -> Result<Vec<u8>, ClientError> {
        let request = tonic::Request::new(JoinRequest {
            collaborator_id: self.collaborator_id.clone(),
        });
        let response = self.inner.join(request).await?;
        Ok(response.into_inner().model_bytes)
    }

    /// Issues `SubmitUpdate` with a 30-second deadline.
    pub async fn submit_update(
        &mut self,
        model_bytes: Vec<u8>,
        num_samples: u32,
        learning_rate: f32,
    ) -> Result<bool, ClientError> {
        let mut request = tonic::Request::new(SubmitUpdateRequest {
            collaborator_id: self.collaborator_id.clone(),
            model_bytes,
            num_samples,
            learning_rate,
        });
        request.set_timeout(SUBMIT_DEADLINE);
        let response = self.inner.submit_update(request).await?;
        Ok(response.into_inner().success)
    }

    /// Issues `GetLatestModel`, returning the model bytes and the
    /// server's current round counter.
    pub async fn get_latest_model(&mut self) -> Result<(Vec<u8>, i32), ClientError> {
        let request = tonic::Request::new(GetLatestModelRequest {
            collaborator_id: self.collaborator_id.clone(),
        });
        let response = self.inner.get_latest_model(request).await?;
        let inner = response.into_inner();
        Ok((inner.model_bytes, inner.current_round))
    }
}
