pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> u16;
    fn database_url(&self) -> Option<String>;
    fn gateway_secret(&self) -> String;
    fn max_connections(&self) -> u32;
}
