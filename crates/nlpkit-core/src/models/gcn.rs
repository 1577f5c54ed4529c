use tch::{nn, nn::ModuleT, Tensor};

use crate::config::GcnConfig;

/// Two-layer graph convolutional network over a fixed, pre-normalized
/// adjacency matrix. Each layer computes `A_hat · X · W + b`, with a
/// ReLU and dropout between the layers. Output is per-node class
/// logits of shape `[num_nodes, num_classes]`.
#[derive(Debug)]
pub struct Gcn {
    a_hat: Tensor,
    fc1: nn::Linear,
    fc2: nn::Linear,
    dropout: f64,
}

impl Gcn {
    /// `a_hat` must already live on the same device as `vs`.
    pub fn new(vs: &nn::Path, a_hat: Tensor, num_features: i64, config: &GcnConfig) -> Self {
        let fc1 = nn::linear(vs / "fc1", num_features, config.hidden_size, Default::default());
        let fc2 = nn::linear(
            vs / "fc2",
            config.hidden_size,
            config.num_classes,
            Default::default(),
        );

        Self {
            a_hat,
            fc1,
            fc2,
            dropout: config.dropout,
        }
    }
}

impl ModuleT for Gcn {
    fn forward_t(&self, features: &Tensor, train: bool) -> Tensor {
        let h = self
            .a_hat
            .matmul(&features.apply(&self.fc1))
            .relu()
            .dropout(self.dropout, train);
        self.a_hat.matmul(&h.apply(&self.fc2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn gcn_output_shape() {
        let vs = nn::VarStore::new(Device::Cpu);
        let config = GcnConfig {
            hidden_size: 8,
            num_classes: 3,
            dropout: 0.0,
        };
        let a_hat = Tensor::eye(5, (Kind::Float, Device::Cpu));
        let net = Gcn::new(&vs.root(), a_hat, 4, &config);

        let features = Tensor::rand(&[5, 4], (Kind::Float, Device::Cpu));
        let logits = net.forward_t(&features, false);
        assert_eq!(logits.size(), &[5, 3]);
    }
}
