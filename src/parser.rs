//! Request-scoped entry point: validate, size-check, then decode off the async runtime

use crate::codec::{Cutout, CutoutCodec, Encoding};
use crate::config::BossConfig;
use crate::error::{BossError, Result};
use crate::lookup::KeySpace;
use crate::request::{CutoutRequest, RequestParams, RequestValidator};
use crate::resource::ResourceCatalog;
use crate::types::ServiceKind;
use crate::utils::drain_async;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Semaphore;

/// Parses POSTed cutout bodies.
///
/// Validation and the size ceiling are checked before the body is read.
/// Decompression runs on Tokio's blocking pool, at most `decode_workers`
/// payloads at a time. Whatever the outcome, the body is fully consumed
/// before this returns.
#[derive(Clone)]
pub struct CutoutParser {
    validator: RequestValidator,
    codec: CutoutCodec,
    permits: Arc<Semaphore>,
}

impl CutoutParser {
    pub fn new(catalog: Arc<dyn ResourceCatalog>, keys: KeySpace, config: Arc<BossConfig>) -> Self {
        let permits = Arc::new(Semaphore::new(config.decode_workers()));
        Self {
            validator: RequestValidator::new(catalog, keys, config.clone()),
            codec: CutoutCodec::new(config),
            permits,
        }
    }

    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    pub fn codec(&self) -> &CutoutCodec {
        &self.codec
    }

    pub async fn parse<R>(
        &self,
        media_type: &str,
        params: &RequestParams,
        body: &mut R,
    ) -> Result<Cutout>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let result = self.parse_inner(media_type, params, body).await;
        if let Err(err) = &result {
            let discarded = drain_async(body).await;
            log::warn!(
                "cutout parse failed for {}/{}/{} ({}), discarded {} unread bytes",
                params.collection,
                params.experiment,
                params.channel,
                err,
                discarded
            );
        }
        result
    }

    async fn parse_inner<R>(
        &self,
        media_type: &str,
        params: &RequestParams,
        body: &mut R,
    ) -> Result<Cutout>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let encoding = Encoding::from_media_type(media_type)?;
        let request = self.validator.parse(ServiceKind::Cutout, params).await?;
        self.codec.check_size(&request)?;

        let bound = self.codec.max_body_len(&request, encoding);
        let mut payload = Vec::new();
        (&mut *body)
            .take(bound as u64 + 1)
            .read_to_end(&mut payload)
            .await?;
        self.decode(request, encoding, Bytes::from(payload)).await
    }

    /// Decode an already-buffered body for a validated request
    pub async fn decode(
        &self,
        request: CutoutRequest,
        encoding: Encoding,
        payload: Bytes,
    ) -> Result<Cutout> {
        self.codec.check_size(&request)?;

        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| BossError::UnhandledInternal(e.to_string()))?;

        let codec = self.codec.clone();
        tokio::task::spawn_blocking(move || codec.decode_bytes(request, encoding, &payload))
            .await
            .map_err(|e| BossError::UnhandledInternal(format!("decode task failed: {}", e)))?
    }
}
