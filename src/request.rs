//! Parsing and geometric validation of cutout requests

use crate::config::BossConfig;
use crate::error::{BossError, Result};
use crate::lookup::{BossKey, CanonicalPath, KeySpace, LookupKey};
use crate::resource::{ResourceCatalog, ResourceDescriptor};
use crate::scaling::{scale_extent, scale_factor};
use crate::types::{Axis, ChannelType, Extent, ServiceKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Raw, unvalidated request parameters as routed by the web layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestParams {
    pub collection: String,
    pub experiment: String,
    pub channel: String,
    pub resolution: String,
    pub x_range: String,
    pub y_range: String,
    pub z_range: String,
    pub time_range: Option<String>,
}

impl RequestParams {
    pub fn new(
        collection: impl Into<String>,
        experiment: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            experiment: experiment.into(),
            channel: channel.into(),
            ..Default::default()
        }
    }

    pub fn resolution(mut self, resolution: impl ToString) -> Self {
        self.resolution = resolution.to_string();
        self
    }

    pub fn ranges(
        mut self,
        x: impl Into<String>,
        y: impl Into<String>,
        z: impl Into<String>,
    ) -> Self {
        self.x_range = x.into();
        self.y_range = y.into();
        self.z_range = z.into();
        self
    }

    pub fn time(mut self, time: impl Into<String>) -> Self {
        self.time_range = Some(time.into());
        self
    }

    pub fn path(&self) -> CanonicalPath {
        CanonicalPath::channel(&self.collection, &self.experiment, &self.channel)
    }
}

/// Parse `"start:stop"` into integers with `start < stop`
pub fn parse_range(axis: Axis, value: &str) -> Result<(i64, i64)> {
    let malformed = || BossError::MalformedRange {
        axis,
        value: value.to_string(),
    };
    let (start, stop) = value.trim().split_once(':').ok_or_else(malformed)?;
    let start: i64 = start.trim().parse().map_err(|_| malformed())?;
    let stop: i64 = stop.trim().parse().map_err(|_| malformed())?;
    if start >= stop {
        return Err(malformed());
    }
    Ok((start, stop))
}

/// Time accepts either `"start:stop"` or a single sample index
fn parse_time_range(value: &str) -> Result<(i64, i64)> {
    match value.trim().parse::<i64>() {
        Ok(t) => Ok((t, t.saturating_add(1))),
        Err(_) => parse_range(Axis::T, value),
    }
}

fn check_within(axis: Axis, requested: (i64, i64), legal: Extent) -> Result<Extent> {
    let out_of_bounds = || BossError::OutOfBounds {
        axis,
        requested,
        legal: (legal.start, legal.stop),
    };
    let start = u64::try_from(requested.0).map_err(|_| out_of_bounds())?;
    let stop = u64::try_from(requested.1).map_err(|_| out_of_bounds())?;
    let extent = Extent::new(start, stop);
    if !legal.contains(&extent) {
        return Err(out_of_bounds());
    }
    Ok(extent)
}

/// A validated, in-bounds cutout request
#[derive(Debug, Clone, PartialEq)]
pub struct CutoutRequest {
    pub service: ServiceKind,
    pub resource: ResourceDescriptor,
    pub resolution: u32,
    pub x: Extent,
    pub y: Extent,
    pub z: Extent,
    pub time: Extent,
    /// True when the client asked for time explicitly; decoded arrays are 4-D
    pub time_requested: bool,
}

impl CutoutRequest {
    pub fn x_span(&self) -> u64 {
        self.x.span()
    }

    pub fn y_span(&self) -> u64 {
        self.y.span()
    }

    pub fn z_span(&self) -> u64 {
        self.z.span()
    }

    pub fn t_span(&self) -> u64 {
        self.time.span()
    }

    pub fn boss_key(&self) -> &BossKey {
        &self.resource.boss_key
    }

    pub fn lookup_key(&self) -> &LookupKey {
        &self.resource.lookup_key
    }

    /// Addressing pair for one time sample of the channel
    pub fn time_keys(&self, time: u32) -> (LookupKey, BossKey) {
        (
            self.resource.lookup_key.with_time(time),
            self.resource.boss_key.with_time(time),
        )
    }

    /// Row-major shape a payload for this request must decode to
    pub fn shape(&self) -> Vec<usize> {
        let spatial = [
            self.z_span() as usize,
            self.y_span() as usize,
            self.x_span() as usize,
        ];
        if self.time_requested {
            let mut shape = vec![self.t_span() as usize];
            shape.extend(spatial);
            shape
        } else {
            spatial.to_vec()
        }
    }

    pub fn element_count(&self) -> u64 {
        self.x_span()
            .saturating_mul(self.y_span())
            .saturating_mul(self.z_span())
            .saturating_mul(self.t_span())
    }

    /// Uncompressed size implied by the URL extents
    pub fn uncompressed_bytes(&self) -> u64 {
        self.element_count()
            .saturating_mul(self.resource.datatype.size_in_bytes() as u64)
    }
}

/// Turns raw parameters into a [`CutoutRequest`]
#[derive(Clone)]
pub struct RequestValidator {
    catalog: Arc<dyn ResourceCatalog>,
    keys: KeySpace,
    config: Arc<BossConfig>,
}

impl RequestValidator {
    pub fn new(catalog: Arc<dyn ResourceCatalog>, keys: KeySpace, config: Arc<BossConfig>) -> Self {
        Self {
            catalog,
            keys,
            config,
        }
    }

    pub fn config(&self) -> &Arc<BossConfig> {
        &self.config
    }

    pub async fn parse(&self, service: ServiceKind, params: &RequestParams) -> Result<CutoutRequest> {
        let resource = ResourceDescriptor::resolve(
            self.catalog.as_ref(),
            &self.keys,
            &params.path(),
            &self.config,
        )
        .await?;

        if service.requires_annotation() && resource.channel_type != ChannelType::Annotation {
            return Err(BossError::ResourceTypeMismatch(format!(
                "The {:?} service requires an annotation channel, {} is {}",
                service, resource.path, resource.channel_type
            )));
        }

        let x = parse_range(Axis::X, &params.x_range)?;
        let y = parse_range(Axis::Y, &params.y_range)?;
        let z = parse_range(Axis::Z, &params.z_range)?;

        // Checked before bounds: scaling by an absurd level would misreport the failure
        let resolution = self.parse_resolution(&params.resolution, &resource)?;

        let mut extents = [Extent::new(0, 0); 3];
        for (i, (axis, requested)) in [(Axis::X, x), (Axis::Y, y), (Axis::Z, z)]
            .into_iter()
            .enumerate()
        {
            let factor = scale_factor(
                axis,
                resolution,
                resource.hierarchy_method,
                resource.iso_break_level,
            );
            let legal = scale_extent(&resource.bounds[i], factor);
            extents[i] = check_within(axis, requested, legal)?;
        }

        let (time, time_requested) = match params.time_range.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                resource.ensure_time_series()?;
                let requested = parse_time_range(raw)?;
                // Samples 0..=max_time_sample all have keys
                let legal = Extent::new(0, resource.max_time_sample as u64 + 1);
                (check_within(Axis::T, requested, legal)?, true)
            }
            _ => {
                let t = resource.default_time_sample as u64;
                (Extent::new(t, t + 1), false)
            }
        };

        log::debug!(
            "validated {:?} request for {} at res {}: x={} y={} z={} t={}",
            service,
            resource.boss_key,
            resolution,
            extents[0],
            extents[1],
            extents[2],
            time
        );

        Ok(CutoutRequest {
            service,
            resource,
            resolution,
            x: extents[0],
            y: extents[1],
            z: extents[2],
            time,
            time_requested,
        })
    }

    fn parse_resolution(&self, raw: &str, resource: &ResourceDescriptor) -> Result<u32> {
        let max = resource.hierarchy_depth.saturating_sub(1);
        let invalid = || BossError::InvalidResolution {
            requested: raw.to_string(),
            max,
        };
        let resolution: i64 = raw.trim().parse().map_err(|_| invalid())?;
        if resolution < 0 || resolution > max as i64 {
            return Err(invalid());
        }
        Ok(resolution as u32)
    }
}
