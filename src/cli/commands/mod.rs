pub mod analyse;
pub mod test_rpc;
