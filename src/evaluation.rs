use crate::{NnueErr, Result, data::PositionSet, features::FeatureEncoder, network::Network};

/// Scores positions, one integer per position.
pub trait Evaluator {
    fn evaluate(&mut self, positions: &PositionSet) -> Result<Vec<i64>>;
}

/// Scores positions with a trained network, rounding each output to the nearest integer.
#[derive(Debug, Clone)]
pub struct NetworkEvaluator {
    network: Network,
    encoder: FeatureEncoder,
    batch_size: usize,
}

impl NetworkEvaluator {
    /// Creates a new `NetworkEvaluator`.
    ///
    /// # Returns
    /// An error if the network's input doesn't match the encoder's width.
    pub fn new(network: Network, encoder: FeatureEncoder, batch_size: usize) -> Result<Self> {
        if network.topology().input != encoder.width() {
            return Err(NnueErr::LengthMismatch {
                what: "network input",
                got: network.topology().input,
                expected: encoder.width(),
            });
        }

        Ok(Self {
            network,
            encoder,
            batch_size: batch_size.max(1),
        })
    }
}

impl Evaluator for NetworkEvaluator {
    fn evaluate(&mut self, positions: &PositionSet) -> Result<Vec<i64>> {
        let rows: Vec<usize> = (0..positions.len()).collect();
        let mut scores = Vec::with_capacity(rows.len());

        for chunk in rows.chunks(self.batch_size) {
            let x = self.encoder.encode_rows(positions, chunk)?;
            let y_pred = self.network.predict(x.view())?;
            scores.extend(y_pred.iter().map(|score| score.round() as i64));
        }

        Ok(scores)
    }
}
