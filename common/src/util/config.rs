use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            input: InputConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    /// Expansion of the pin bounding box that limits the search area.
    #[serde(default = "default_bounding_box_margin")]
    pub bounding_box_margin: u32,
    /// Per-unit cost of overfilled edges when capacity limits are lifted.
    #[serde(default = "default_emergency_penalty_factor")]
    pub emergency_penalty_factor: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bounding_box_margin: default_bounding_box_margin(),
            emergency_penalty_factor: default_emergency_penalty_factor(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_problem_file")]
    pub problem_file: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            problem_file: default_problem_file(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Optional PNG rendering of the routed design.
    #[serde(default)]
    pub image_file: Option<String>,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            image_file: None,
            image_size: default_image_size(),
        }
    }
}

fn default_bounding_box_margin() -> u32 {
    10
}

fn default_emergency_penalty_factor() -> f32 {
    10.0
}

fn default_problem_file() -> String {
    "adaptec1.capo70.2d.35.50.90.gr".to_string()
}

fn default_image_size() -> u32 {
    2000
}
