pub mod client;
pub mod slots;

pub const DEFAULT_BASE_URL: &str = "https://ttp.cbp.dhs.gov/schedulerapi";
pub const BOOKING_URL: &str = "https://ttp.cbp.dhs.gov/";
pub const SLOTS_PATH: &str = "slots";
