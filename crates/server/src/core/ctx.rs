/// Request-scoped identity, inserted into request extensions once the
/// credential gate has accepted the request.
#[derive(Clone, Debug)]
pub struct Ctx {
    mount: String,
    username: String,
}

impl Ctx {
    pub fn new(mount: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            mount: mount.into(),
            username: username.into(),
        }
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}
