//! Services: reversal command processing and the arbitration desk.

pub mod arbitration;
pub mod reversal;

#[cfg(test)]
mod tests;
