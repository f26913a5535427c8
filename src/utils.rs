pub mod calculate;
pub mod circular_queue;
