use crate::training::TrainingConfig;

/// Where a training run executes, decided once before training starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// LibTorch on the first CUDA device (`tch-gpu` feature).
    Cuda,
    /// WebGPU on the default graphics adapter (`wgpu` feature).
    Wgpu,
    /// NdArray on the host CPU, always available.
    Cpu,
}

impl ExecutionContext {
    /// Picks the preferred context allowed by `config` and compiled into this binary.
    pub fn select(config: &TrainingConfig) -> Self {
        let context = Self::resolve(
            cfg!(feature = "tch-gpu") && !config.no_cuda,
            cfg!(feature = "wgpu") && !config.no_wgpu,
        );
        log::info!("Using {context}");

        context
    }

    fn resolve(cuda: bool, wgpu: bool) -> Self {
        if cuda {
            ExecutionContext::Cuda
        } else if wgpu {
            ExecutionContext::Wgpu
        } else {
            ExecutionContext::Cpu
        }
    }
}

impl core::fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExecutionContext::Cuda => f.write_str("cuda"),
            ExecutionContext::Wgpu => f.write_str("wgpu"),
            ExecutionContext::Cpu => f.write_str("cpu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::AdadeltaConfig;

    #[test]
    fn prefers_cuda_then_graphics_then_cpu() {
        assert_eq!(ExecutionContext::resolve(true, true), ExecutionContext::Cuda);
        assert_eq!(ExecutionContext::resolve(true, false), ExecutionContext::Cuda);
        assert_eq!(ExecutionContext::resolve(false, true), ExecutionContext::Wgpu);
        assert_eq!(ExecutionContext::resolve(false, false), ExecutionContext::Cpu);
    }

    #[test]
    fn disabling_accelerators_forces_cpu() {
        let config = TrainingConfig::new(AdadeltaConfig::new())
            .with_no_cuda(true)
            .with_no_wgpu(true);

        assert_eq!(ExecutionContext::select(&config), ExecutionContext::Cpu);
    }
}
