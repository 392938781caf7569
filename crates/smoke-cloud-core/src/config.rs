use serde::{Deserialize, Serialize};

/// How ground-level cells are treated by the rounding pass.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroundEdgeRule {
    /// Ground cells are anchored to the floor and never rounded away.
    #[default]
    Exempt,
    /// Ground cells with fewer than four occupied neighbors count as margins.
    Threshold,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    /// Seconds between arming and the start of deployment.
    pub fuse_delay: f64,
    /// Growth ticks per second while deploying.
    pub deploy_speed: f64,
    /// Seconds the fully deployed cloud persists before decaying.
    pub lifetime: f64,
    /// Decay ticks per second while decaying.
    pub decay_speed: f64,
    /// Total number of cells the cloud may occupy.
    pub volume: usize,
    /// Height cap of the cloud in cells. Also the grid's vertical dimension.
    pub height: usize,
    /// World-space edge length of one cell.
    pub scale: f64,
    /// Number of margin-trimming passes run after growth stops.
    pub roundness: usize,
    /// Ask the host to despawn the whole entity once decay completes.
    pub destroy_on_finish: bool,
    /// Render layer handed to the cell factory.
    pub layer: u32,
    /// Optional material name for visible cells.
    pub material: Option<String>,
    /// Render cells visibly. When false cells are collider-only.
    pub debug_visible: bool,
    /// Start armed (`Thrown`) instead of waiting for `trigger()`.
    pub start_thrown: bool,
    /// Ground-level margin rule used by the rounding pass.
    pub ground_edge_rule: GroundEdgeRule,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            fuse_delay: 1.0,
            deploy_speed: 12.0,
            lifetime: 7.0,
            decay_speed: 3.0,
            volume: 350,
            height: 4,
            scale: 1.0,
            roundness: 2,
            destroy_on_finish: true,
            layer: 1,
            material: None,
            debug_visible: true,
            start_thrown: true,
            ground_edge_rule: GroundEdgeRule::Exempt,
        }
    }
}

macro_rules! define_cloud_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum CloudConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for CloudConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_cloud_config_error! {
    InvalidVolume => "volume must be greater than 0";
    InvalidHeight => "height must be greater than 0";
    FootprintTooSmall { volume: usize, height: usize } => "volume ({}) must be at least height ({}) to give a non-empty footprint", volume, height;
    GridTooLarge { max: usize, actual: usize } => "grid cell count ({}) exceeds supported maximum ({})", actual, max;
    GridSizeOverflow => "grid cell count overflows usize";
    InvalidScale => "scale must be positive and finite";
    InvalidDeploySpeed => "deploy_speed must be positive and finite";
    InvalidDecaySpeed => "decay_speed must be positive and finite";
    InvalidFuseDelay => "fuse_delay must be finite and non-negative";
    InvalidLifetime => "lifetime must be finite and non-negative";
}

impl std::error::Error for CloudConfigError {}

impl CloudConfig {
    pub const MAX_GRID_CELLS: usize = crate::constants::MAX_GRID_CELLS;

    pub fn validate(&self) -> Result<(), CloudConfigError> {
        self.validate_volume()?;
        self.validate_grid_size()?;
        self.validate_scale()?;
        self.validate_timing()?;
        Ok(())
    }

    /// Grid dimensions `(X, Y, Z)` derived from volume and height.
    pub fn grid_dims(&self) -> [usize; 3] {
        let footprint = self.volume.checked_div(self.height).unwrap_or(0);
        [footprint, self.height, footprint]
    }

    fn validate_volume(&self) -> Result<(), CloudConfigError> {
        if self.volume == 0 {
            return Err(CloudConfigError::InvalidVolume);
        }
        if self.height == 0 {
            return Err(CloudConfigError::InvalidHeight);
        }
        if self.volume < self.height {
            return Err(CloudConfigError::FootprintTooSmall {
                volume: self.volume,
                height: self.height,
            });
        }
        Ok(())
    }

    fn validate_grid_size(&self) -> Result<(), CloudConfigError> {
        let [x, y, z] = self.grid_dims();
        let cells = x
            .checked_mul(y)
            .and_then(|xy| xy.checked_mul(z))
            .ok_or(CloudConfigError::GridSizeOverflow)?;
        if cells > Self::MAX_GRID_CELLS {
            return Err(CloudConfigError::GridTooLarge {
                max: Self::MAX_GRID_CELLS,
                actual: cells,
            });
        }
        Ok(())
    }

    fn validate_scale(&self) -> Result<(), CloudConfigError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(CloudConfigError::InvalidScale);
        }
        Ok(())
    }

    fn validate_timing(&self) -> Result<(), CloudConfigError> {
        if !(self.deploy_speed.is_finite() && self.deploy_speed > 0.0) {
            return Err(CloudConfigError::InvalidDeploySpeed);
        }
        if !(self.decay_speed.is_finite() && self.decay_speed > 0.0) {
            return Err(CloudConfigError::InvalidDecaySpeed);
        }
        if !(self.fuse_delay.is_finite() && self.fuse_delay >= 0.0) {
            return Err(CloudConfigError::InvalidFuseDelay);
        }
        if !(self.lifetime.is_finite() && self.lifetime >= 0.0) {
            return Err(CloudConfigError::InvalidLifetime);
        }
        Ok(())
    }
}
