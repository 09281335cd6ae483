use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, SimpleOptimizer},
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
    LearningRate,
};

/// Adadelta configuration.
#[derive(Config, Debug)]
pub struct AdadeltaConfig {
    /// Decay of the running averages of squared gradients and squared updates.
    #[config(default = 0.9)]
    pub rho: f32,
    /// A value required for numerical stability.
    #[config(default = 1e-6)]
    pub epsilon: f32,
    /// L2 penalty added to the gradient.
    #[config(default = 0.0)]
    pub weight_decay: f32,
}

/// Adadelta optimizer as described in the paper
/// [ADADELTA: An Adaptive Learning Rate Method](https://arxiv.org/abs/1212.5701).
///
/// The step size of each parameter adapts to the ratio of the running RMS of past
/// updates to the running RMS of past gradients; the learning rate only scales it.
#[derive(Clone)]
pub struct Adadelta {
    rho: f32,
    epsilon: f32,
    weight_decay: f32,
}

/// Adadelta state.
#[derive(Record, Clone, new)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    /// Running average of the squared gradients.
    pub square_avg: Tensor<B, D>,
    /// Running average of the squared updates.
    pub acc_delta: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr: LearningRate,
        tensor: Tensor<B, D>,
        mut grad: Tensor<B, D>,
        state: Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        if self.weight_decay != 0.0 {
            grad = tensor.clone().mul_scalar(self.weight_decay).add(grad);
        }

        let (square_avg, acc_delta) = match state {
            Some(state) => (state.square_avg, state.acc_delta),
            None => (grad.zeros_like(), grad.zeros_like()),
        };

        let square_avg = square_avg
            .mul_scalar(self.rho)
            .add(grad.clone().powi_scalar(2).mul_scalar(1.0 - self.rho));
        let std = square_avg.clone().add_scalar(self.epsilon).sqrt();
        let delta = acc_delta
            .clone()
            .add_scalar(self.epsilon)
            .sqrt()
            .div(std)
            .mul(grad);
        let acc_delta = acc_delta
            .mul_scalar(self.rho)
            .add(delta.clone().powi_scalar(2).mul_scalar(1.0 - self.rho));

        let state = AdadeltaState::new(square_avg, acc_delta);

        (tensor - delta.mul_scalar(lr), Some(state))
    }

    fn to_device<const D: usize>(mut state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        state.square_avg = state.square_avg.to_device(device);
        state.acc_delta = state.acc_delta.to_device(device);
        state
    }
}

impl AdadeltaConfig {
    /// Initialize Adadelta optimizer.
    ///
    /// # Returns
    ///
    /// Returns an optimizer that can be used to optimize a module.
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(
        &self,
    ) -> OptimizerAdaptor<Adadelta, M, B> {
        OptimizerAdaptor::from(Adadelta {
            rho: self.rho,
            epsilon: self.epsilon,
            weight_decay: self.weight_decay,
        })
    }
}

/// Multiplies the learning rate by `gamma` once per epoch.
///
/// The decay never looks at evaluation results.
#[derive(Clone, Copy, Debug)]
pub struct EpochDecay {
    lr: LearningRate,
    gamma: f64,
}

impl EpochDecay {
    pub fn new(initial_lr: LearningRate, gamma: f64) -> Self {
        Self {
            lr: initial_lr,
            gamma,
        }
    }

    /// Learning rate of the current epoch.
    pub fn lr(&self) -> LearningRate {
        self.lr
    }

    /// Moves to the next epoch and returns its learning rate.
    pub fn step(&mut self) -> LearningRate {
        self.lr *= self.gamma;
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TestAutodiffBackend, TestBackend};
    use burn::{
        nn::LinearConfig,
        optim::{GradientsParams, Optimizer},
    };

    const LEARNING_RATE: LearningRate = 1.0;

    fn adadelta() -> Adadelta {
        Adadelta {
            rho: 0.9,
            epsilon: 1e-6,
            weight_decay: 0.0,
        }
    }

    /// Reference update rule for a single scalar.
    fn reference_step(param: f32, grad: f32, square_avg: f32, acc_delta: f32) -> (f32, f32, f32) {
        let (rho, eps) = (0.9f32, 1e-6f32);
        let square_avg = rho * square_avg + (1.0 - rho) * grad * grad;
        let delta = (acc_delta + eps).sqrt() / (square_avg + eps).sqrt() * grad;
        let acc_delta = rho * acc_delta + (1.0 - rho) * delta * delta;
        (param - delta, square_avg, acc_delta)
    }

    #[test]
    fn test_adadelta_matches_reference_rule_over_two_steps() {
        let device = Default::default();
        let optim = adadelta();
        let params = [1.0f32, -2.0, 0.5];
        let grads = [[0.5f32, -0.5, 2.0], [0.25, 0.1, -1.0]];

        let mut tensor = Tensor::<TestBackend, 1>::from_floats(params, &device);
        let mut state = None;
        for grad in grads {
            let grad = Tensor::<TestBackend, 1>::from_floats(grad, &device);
            let (updated, next) = optim.step(LEARNING_RATE, tensor, grad, state);
            tensor = updated;
            state = next;
        }

        let actual = tensor.into_data().to_vec::<f32>().unwrap();
        for (i, param) in params.iter().enumerate() {
            let (p, s, a) = reference_step(*param, grads[0][i], 0.0, 0.0);
            let (expected, _, _) = reference_step(p, grads[1][i], s, a);
            assert!(
                (actual[i] - expected).abs() < 1e-6,
                "param {i}: {} != {expected}",
                actual[i]
            );
        }
    }

    #[test]
    fn test_adadelta_scales_update_with_learning_rate() {
        let device = Default::default();
        let optim = adadelta();
        let tensor = Tensor::<TestBackend, 1>::from_floats([0.0], &device);
        let grad = Tensor::<TestBackend, 1>::from_floats([1.0], &device);

        let (full, _) = optim.step(1.0, tensor.clone(), grad.clone(), None);
        let (half, _) = optim.step(0.5, tensor, grad, None);

        let full = full.into_scalar();
        let half = half.into_scalar();
        assert!(full < 0.0);
        assert!((full - 2.0 * half).abs() < 1e-7);
    }

    #[test]
    fn test_adadelta_optimizer_updates_module() {
        let device = Default::default();
        let linear = LinearConfig::new(4, 2).init::<TestAutodiffBackend>(&device);
        let before = linear.weight.val().into_data().to_vec::<f32>().unwrap();

        let x = Tensor::<TestAutodiffBackend, 2>::from_floats(
            [[0.1, -0.2, 0.3, 0.4], [0.5, 0.6, -0.7, 0.8]],
            &device,
        );
        let mut optimizer = AdadeltaConfig::new().init();
        let grads = linear.forward(x).sum().backward();
        let grads = GradientsParams::from_grads(grads, &linear);
        let linear = optimizer.step(LEARNING_RATE, linear, grads);

        let after = linear.weight.val().into_data().to_vec::<f32>().unwrap();
        assert!(before.iter().zip(after.iter()).all(|(b, a)| b != a));
    }

    #[test]
    fn test_epoch_decay_is_geometric() {
        let mut schedule = EpochDecay::new(1.0, 0.7);

        assert_eq!(schedule.lr(), 1.0);
        assert!((schedule.step() - 0.7).abs() < 1e-12);
        assert!((schedule.step() - 0.49).abs() < 1e-12);
        assert!((schedule.lr() - 0.49).abs() < 1e-12);
    }
}
