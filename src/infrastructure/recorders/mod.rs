pub mod playwright;

use anyhow::Result;

use crate::domain::models::RecorderBox;

pub struct RecorderManager {}

impl RecorderManager {
    pub fn get(url: Option<String>) -> Result<RecorderBox> {
        return Ok(Box::new(playwright::Playwright::from_config(url)?));
    }
}
