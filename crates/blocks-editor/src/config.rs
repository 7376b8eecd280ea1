use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Rewrites allowed per unit of dirty work before normalization gives
    /// up. A dirty path counts one unit, plus one per byte of text it holds.
    pub iterations_per_path: usize,
    /// Smallest rewrite budget a normalization run ever gets.
    pub min_iterations: usize,
    /// Return normalization failures as errors instead of restoring the
    /// last normalized snapshot.
    pub strict_normalization: bool,
    /// Wrap bare URLs typed into text in link nodes.
    pub autolink: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            iterations_per_path: 0,
            min_iterations: 0,
            strict_normalization: cfg!(debug_assertions),
            autolink: true,
        }
        .with_defaults()
    }
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.iterations_per_path == 0 {
            self.iterations_per_path = 42;
        }
        if self.min_iterations == 0 {
            self.min_iterations = 100;
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }

    pub fn iteration_budget(&self, dirty_work: usize) -> usize {
        dirty_work
            .saturating_mul(self.iterations_per_path)
            .max(self.min_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let config =
            EditorConfig::from_json_str(r#"{ "iterations_per_path": 0, "autolink": false }"#)
                .unwrap();
        assert_eq!(config.iterations_per_path, 42);
        assert_eq!(config.min_iterations, 100);
        assert!(!config.autolink);
        assert_eq!(config.iteration_budget(10), 420);
        assert_eq!(config.iteration_budget(1), 100);
    }
}
