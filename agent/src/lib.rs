pub mod api;
pub mod config;
pub mod escpos;
pub mod logging;
pub mod server;
pub mod service;
pub mod spooler;
pub mod store;
#[cfg(test)]
mod tests {
    use super::config::{merge_config, AgentConfig};
    use proptest::prelude::*;
    proptest! {
    #[test] fn merge_config_prefers_b_over_a(name in "[A-Za-z]{1,16}", port in 1u16..) { let a=AgentConfig::default(); let mut b=a.clone(); b.service.name=name.clone(); b.http.port=port; let m=merge_config(&a,&b); prop_assert_eq!(m.service.name,name); prop_assert_eq!(m.http.port,port); } }
}
