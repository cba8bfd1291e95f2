pub mod pipeline;
pub mod protocol;

#[cfg(test)]
pub mod test_utils;
