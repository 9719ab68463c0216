// config.rs — collision model tunables
//
// Console-variable style knobs. Values arrive as strings and are parsed the
// way the console parses them: numeric, unparsable reads as 0, nonzero is on.

use log::debug;

pub const DEFAULT_PARALLEL_LUMPS: usize = 64;
pub const DEFAULT_POSITION_LEAFS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmConfig {
    /// `map_noareas`: treat every area as connected to every other.
    pub no_areas: bool,
    /// `cm_parallel_lumps`: lumps with at least this many records decode on
    /// the rayon pool. 0 keeps every lump on the calling thread.
    pub parallel_lump_threshold: usize,
    /// `cm_position_leafs`: leaf list capacity for stationary box tests.
    pub position_leafs: usize,
}

impl Default for CmConfig {
    fn default() -> Self {
        Self {
            no_areas: false,
            parallel_lump_threshold: DEFAULT_PARALLEL_LUMPS,
            position_leafs: DEFAULT_POSITION_LEAFS,
        }
    }
}

fn value_of(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

fn count_of(s: &str) -> usize {
    let v = value_of(s);
    if v.is_finite() && v > 0.0 {
        v as usize
    } else {
        0
    }
}

impl CmConfig {
    pub const NAMES: [&'static str; 3] = ["map_noareas", "cm_parallel_lumps", "cm_position_leafs"];

    /// Set a variable by name. Returns false for names this module doesn't own.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        match name {
            "map_noareas" => self.no_areas = value_of(value) != 0.0,
            "cm_parallel_lumps" => self.parallel_lump_threshold = count_of(value),
            "cm_position_leafs" => self.position_leafs = count_of(value).max(1),
            _ => return false,
        }
        debug!("{} set to \"{}\"", name, value);
        true
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            "map_noareas" => Some(if self.no_areas { "1" } else { "0" }.to_string()),
            "cm_parallel_lumps" => Some(self.parallel_lump_threshold.to_string()),
            "cm_position_leafs" => Some(self.position_leafs.to_string()),
            _ => None,
        }
    }
}
