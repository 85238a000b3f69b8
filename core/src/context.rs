//! Process wide context handed to every leadership term

use std::sync::Arc;

use crate::{config::RecorderConfig, infra::db::Database};

#[derive(Clone)]
pub struct AppContext {
	pub config: Arc<RecorderConfig>,
	pub db: Arc<Database>,
}

impl AppContext {
	pub fn new(config: RecorderConfig, db: Database) -> Self {
		Self {
			config: Arc::new(config),
			db: Arc::new(db),
		}
	}
}
