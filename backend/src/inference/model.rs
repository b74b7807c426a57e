use std::sync::{Arc, Mutex};

use image::DynamicImage;
use image::imageops::FilterType;
use tch::{CModule, Device, Kind, Tensor, nn::ModuleT};

const INPUT_SIZE: u32 = 224;
// ImageNet normalization; the pretrained network expects exactly these.
const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("inference failed: {0}")]
    Output(String),
}

/// One-time-loaded TorchScript classifier. Clones share the module handle;
/// the module is never mutated after load, the mutex only serializes forward
/// passes.
#[derive(Clone)]
pub struct Model {
    module: Arc<Mutex<CModule>>,
    device: Device,
}

impl Model {
    pub fn load(model_path: &str) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(model_path, device)?;
        log::info!("Loaded model from {} on {:?}", model_path, device);
        Ok(Self {
            module: Arc::new(Mutex::new(module)),
            device,
        })
    }

    /// Scores a decoded image, returning the probability that it is
    /// synthetic.
    pub fn score(&self, image: &DynamicImage) -> Result<f32, InferenceError> {
        let input = self.preprocess(image).to_device(self.device);
        let logits = self.module.lock().unwrap().forward_t(&input, false);
        let probs = logits.sigmoid().to_kind(Kind::Float).view([-1]);

        let num_elements = probs.size()[0] as usize;
        let mut output = vec![0.0f32; num_elements];
        probs.copy_data(&mut output, num_elements);

        output
            .first()
            .copied()
            .ok_or_else(|| InferenceError::Output("model returned no elements".into()))
    }

    /// Resize to 224x224, scale to [0,1], ImageNet-normalize, transpose to
    /// CHW, and add the leading batch dimension.
    fn preprocess(&self, image: &DynamicImage) -> Tensor {
        let resized = image
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
            .to_rgb8();
        let raw = resized.as_raw();

        let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
        let mut data = vec![0.0f32; 3 * plane];
        for i in 0..plane {
            for c in 0..3 {
                let value = raw[i * 3 + c] as f32 / 255.0;
                data[c * plane + i] = (value - CHANNEL_MEAN[c]) / CHANNEL_STD[c];
            }
        }

        Tensor::from_slice(&data).view([1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64])
    }
}
