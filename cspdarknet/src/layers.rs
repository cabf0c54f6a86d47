//! # Layer naming and static layer descriptions
//!
//! Every learnable layer of the backbone carries a dotted hierarchical name
//! (`backbone.dark3.1.cv3.2.conv`). External weight-loading code keys on these
//! names, so they are built here as plain values and threaded through each
//! builder call instead of living in a global registry.
//!
//! A [`LayerManifest`] is the tensor-free description of one backbone
//! construction: every layer in execution order with its kind, parameters and
//! output shape.

use std::collections::HashSet;
use std::fmt;

use crate::error::{DarknetError, DarknetResult};

/// Hierarchical dotted layer name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LayerName(String);

impl LayerName {
    /// A name with a single segment.
    pub fn root(segment: impl Into<String>) -> Self {
        Self(segment.into())
    }

    /// Appends one segment, e.g. `backbone.dark3` + `1` = `backbone.dark3.1`.
    #[must_use]
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        if self.0.is_empty() {
            Self(segment.to_string())
        } else {
            Self(format!("{}.{segment}", self.0))
        }
    }

    /// The dotted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if no segment has been set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LayerName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Spatial size and depth of a single (unbatched) feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl FeatureShape {
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Burn NCHW dims for a batch of this shape.
    pub const fn dims(&self, batch_size: usize) -> [usize; 4] {
        [batch_size, self.channels, self.height, self.width]
    }

    /// Same spatial size, different depth.
    #[must_use]
    pub const fn with_channels(self, channels: usize) -> Self {
        Self { channels, ..self }
    }
}

impl fmt::Display for FeatureShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.height, self.width, self.channels)
    }
}

/// What a layer does, with the parameters it was built with.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    /// Explicit zero padding `[left, right, top, bottom]`.
    ZeroPad { padding: [usize; 4] },
    /// Bias-free 2D convolution.
    Conv2d {
        channels: [usize; 2],
        kernel_size: [usize; 2],
        stride: [usize; 2],
        same_padding: bool,
    },
    /// Batch normalization over the channel axis.
    BatchNorm {
        features: usize,
        momentum: f64,
        epsilon: f64,
    },
    /// Leaky ReLU activation.
    LeakyRelu { negative_slope: f64 },
    /// Max pooling.
    MaxPool {
        kernel_size: [usize; 2],
        stride: [usize; 2],
    },
    /// Channel concatenation of previously produced branches.
    Concat { inputs: Vec<usize> },
}

impl LayerKind {
    /// Whether the layer owns parameters that checkpoints restore by name.
    pub const fn is_learnable(&self) -> bool {
        matches!(self, Self::Conv2d { .. } | Self::BatchNorm { .. })
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroPad { padding } => write!(f, "ZeroPad2d{padding:?}"),
            Self::Conv2d {
                channels,
                kernel_size,
                stride,
                same_padding,
            } => write!(
                f,
                "Conv2d({} -> {}, k={}x{}, s={}x{}, {})",
                channels[0],
                channels[1],
                kernel_size[0],
                kernel_size[1],
                stride[0],
                stride[1],
                if *same_padding { "same" } else { "valid" }
            ),
            Self::BatchNorm {
                features,
                momentum,
                epsilon,
            } => write!(f, "BatchNorm({features}, momentum={momentum}, eps={epsilon})"),
            Self::LeakyRelu { negative_slope } => write!(f, "LeakyReLU({negative_slope})"),
            Self::MaxPool {
                kernel_size,
                stride,
            } => write!(
                f,
                "MaxPool2d(k={}x{}, s={}x{})",
                kernel_size[0], kernel_size[1], stride[0], stride[1]
            ),
            Self::Concat { inputs } => write!(f, "Concat{inputs:?}"),
        }
    }
}

/// One graph-construction step.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    pub name: LayerName,
    pub kind: LayerKind,
    pub output: FeatureShape,
}

impl LayerDescriptor {
    pub fn new(name: LayerName, kind: LayerKind, output: FeatureShape) -> Self {
        Self { name, kind, output }
    }
}

/// Tensor-free description of a full backbone construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerManifest {
    pub input: FeatureShape,
    pub layers: Vec<LayerDescriptor>,
    /// `feat1`, `feat2`, `feat3`.
    pub features: [FeatureShape; 3],
}

impl LayerManifest {
    /// Names of every layer with parameters, in construction order.
    pub fn learnable_names(&self) -> Vec<&str> {
        self.layers
            .iter()
            .filter(|layer| layer.kind.is_learnable())
            .map(|layer| layer.name.as_str())
            .collect()
    }

    /// Looks a layer up by its full name.
    pub fn get(&self, name: &str) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|layer| layer.name.as_str() == name)
    }

    /// Fails with the first name that appears twice.
    pub fn check_unique_names(&self) -> DarknetResult<()> {
        let mut seen = HashSet::with_capacity(self.layers.len());
        for layer in &self.layers {
            if !seen.insert(layer.name.as_str()) {
                return Err(DarknetError::DuplicateLayerName {
                    name: layer.name.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for LayerManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "input {}", self.input)?;
        for layer in &self.layers {
            writeln!(f, "{:<32} {:<52} -> {}", layer.name, layer.kind, layer.output)?;
        }
        for (i, feat) in self.features.iter().enumerate() {
            writeln!(f, "feat{} {feat}", i + 1)?;
        }
        Ok(())
    }
}
