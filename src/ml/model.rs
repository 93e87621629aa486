use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

/// Number of labels predicted by the auxiliary classification head
pub const NUM_CLASSES: usize = 2;

/// What every segmentation network returns for a batch of images.
pub struct SegmentationOutput<B: Backend> {
    /// Per-pixel mask logits — shape: [batch, 1, H, W]
    pub mask_logits:  Tensor<B, 4>,
    /// Image-level class logits — shape: [batch, NUM_CLASSES]
    pub class_logits: Tensor<B, 2>,
}

/// A network that maps [batch, 3, H, W] images to mask and class logits.
/// The training loop, the inference runner and the tests only talk to
/// the network through this trait.
pub trait SegmentationNetwork<B: Backend> {
    fn segment(&self, images: Tensor<B, 4>) -> SegmentationOutput<B>;
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct UNetConfig {
    /// Channels of the first encoder stage; doubled at every level
    #[config(default = 16)]
    pub base_channels: usize,
    /// Number of down-sampling stages. Input sides must be divisible by 2^depth.
    #[config(default = 4)]
    pub depth: usize,
    /// Dropout in front of the classification head
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        let depth = self.depth.max(1);
        let ch    = |level: usize| self.base_channels << level;

        let encoders: Vec<ConvBlock<B>> = (0..depth)
            .map(|level| {
                let input = if level == 0 { 3 } else { ch(level - 1) };
                ConvBlock::new(input, ch(level), device)
            })
            .collect();
        let bottleneck = ConvBlock::new(ch(depth - 1), ch(depth), device);

        // deepest first, so they line up with the reversed skip list
        let decoders: Vec<UpBlock<B>> = (0..depth)
            .rev()
            .map(|level| UpBlock::new(ch(level + 1), ch(level), device))
            .collect();

        UNet {
            encoders,
            bottleneck,
            decoders,
            pool:          MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            mask_head:     Conv2dConfig::new([ch(0), 1], [1, 1]).init(device),
            class_pool:    AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            class_dropout: DropoutConfig::new(self.dropout).init(),
            class_head:    LinearConfig::new(ch(depth), NUM_CLASSES).init(device),
        }
    }
}

/// Two 3×3 convolutions, each followed by ReLU
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
}

impl<B: Backend> ConvBlock<B> {
    fn new(input: usize, output: usize, device: &B::Device) -> Self {
        let conv = |i, o| {
            Conv2dConfig::new([i, o], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };
        Self { conv1: conv(input, output), conv2: conv(output, output) }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv1.forward(x));
        relu(self.conv2.forward(x))
    }
}

/// 2× transposed-conv upsampling, concat with the skip, then a ConvBlock
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    pub up:    ConvTranspose2d<B>,
    pub block: ConvBlock<B>,
}

impl<B: Backend> UpBlock<B> {
    fn new(input: usize, output: usize, device: &B::Device) -> Self {
        let up = ConvTranspose2dConfig::new([input, output], [2, 2])
            .with_stride([2, 2])
            .init(device);
        Self { up, block: ConvBlock::new(output * 2, output, device) }
    }

    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.up.forward(x);
        self.block.forward(Tensor::cat(vec![x, skip], 1))
    }
}

#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    pub encoders:      Vec<ConvBlock<B>>,
    pub bottleneck:    ConvBlock<B>,
    pub decoders:      Vec<UpBlock<B>>,
    pub pool:          MaxPool2d,
    pub mask_head:     Conv2d<B>,
    pub class_pool:    AdaptiveAvgPool2d,
    pub class_dropout: Dropout,
    pub class_head:    Linear<B>,
}

impl<B: Backend> UNet<B> {
    /// images: [batch, 3, H, W] → mask logits [batch, 1, H, W], class logits [batch, 2]
    pub fn forward(&self, images: Tensor<B, 4>) -> SegmentationOutput<B> {
        let mut skips = Vec::with_capacity(self.encoders.len());
        let mut x = images;
        for encoder in &self.encoders {
            let features = encoder.forward(x);
            x = self.pool.forward(features.clone());
            skips.push(features);
        }

        let bottom = self.bottleneck.forward(x);

        // Classification branch: global average pool over the bottleneck
        let pooled = self.class_pool.forward(bottom.clone()).flatten::<2>(1, 3);
        let class_logits = self.class_head.forward(self.class_dropout.forward(pooled));

        let mut x = bottom;
        for (decoder, skip) in self.decoders.iter().zip(skips.into_iter().rev()) {
            x = decoder.forward(x, skip);
        }

        SegmentationOutput {
            mask_logits: self.mask_head.forward(x),
            class_logits,
        }
    }
}

impl<B: Backend> SegmentationNetwork<B> for UNet<B> {
    fn segment(&self, images: Tensor<B, 4>) -> SegmentationOutput<B> {
        self.forward(images)
    }
}

/// Mean binary cross-entropy on logits.
///
/// Written out as  max(x,0) - x·y + ln(1 + e^{-|x|})  so it stays
/// finite for large |x| and accepts soft targets in [0,1] (resized
/// masks are not strictly binary).
pub fn bce_with_logits<B: Backend>(logits: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
    let per_pixel = relu(logits.clone())
        - logits.clone() * targets
        + logits.abs().neg().exp().log1p();
    per_pixel.mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_output_shapes() {
        let device = Default::default();
        let model  = UNetConfig::new()
            .with_base_channels(2)
            .with_depth(2)
            .init::<TestBackend>(&device);

        let out = model.segment(Tensor::zeros([2, 3, 16, 16], &device));
        assert_eq!(out.mask_logits.dims(),  [2, 1, 16, 16]);
        assert_eq!(out.class_logits.dims(), [2, NUM_CLASSES]);
    }

    #[test]
    fn test_bce_matches_closed_form() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 4>::zeros([1, 1, 2, 2], &device);
        let targets = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);

        // sigmoid(0) = 0.5 → loss = ln 2 for every pixel
        let loss: f32 = bce_with_logits(logits, targets).into_scalar().elem();
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_bce_is_finite_for_large_logits() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 4>::full([1, 1, 2, 2], 1000.0, &device);
        let targets = Tensor::<TestBackend, 4>::zeros([1, 1, 2, 2], &device);
        let loss: f32 = bce_with_logits(logits, targets).into_scalar().elem();
        assert!(loss.is_finite());
        assert!((loss - 1000.0).abs() < 1e-2);
    }
}
