//! In-process event bus for committed changes
//!
//! Publishing awaits every subscriber of the topic, in registration order, before returning.
//! Topics are per resource type (and row type). Subscribers are registered on a
//! [`PubSubBuilder`] which is then frozen into a [`PubSub`], there is no way to subscribe
//! after the first publish.

use std::{
	any::{Any, TypeId},
	collections::HashMap,
	panic::AssertUnwindSafe,
	sync::Arc,
};

use async_trait::async_trait;
use futures::FutureExt;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{error, trace};

use crate::recorder::ResourceType;

pub mod message;

pub use message::{ChangeMessage, DomainMessage, ResourceChange};

#[derive(Debug, Error)]
pub enum SubscriberError {
	#[error("Database error: {0}")]
	Db(#[from] DbErr),

	#[error("{0}")]
	Rejected(String),
}

pub type SubscriberResult = Result<(), SubscriberError>;

#[async_trait]
pub trait ResourceSubscriber<M>: Send + Sync {
	fn name(&self) -> &str;

	async fn on_message(&self, message: &ChangeMessage<M>) -> SubscriberResult;
}

#[async_trait]
pub trait DomainSubscriber: Send + Sync {
	fn name(&self) -> &str;

	async fn on_domain_message(&self, message: &DomainMessage) -> SubscriberResult;
}

struct Topic<M> {
	subscribers: Vec<Arc<dyn ResourceSubscriber<M>>>,
}

impl<M> Default for Topic<M> {
	fn default() -> Self {
		Self {
			subscribers: Vec::new(),
		}
	}
}

type TopicKey = (ResourceType, TypeId);

#[derive(Default)]
pub struct PubSubBuilder {
	topics: HashMap<TopicKey, Box<dyn Any + Send + Sync>>,
	domain_subscribers: Vec<Arc<dyn DomainSubscriber>>,
}

impl PubSubBuilder {
	pub fn subscribe<M: Send + Sync + 'static>(
		&mut self,
		resource_type: ResourceType,
		subscriber: Arc<dyn ResourceSubscriber<M>>,
	) -> &mut Self {
		let topic = self
			.topics
			.entry((resource_type, TypeId::of::<M>()))
			.or_insert_with(|| Box::new(Topic::<M>::default()));

		// The key carries the row type, so the downcast can't miss
		if let Some(topic) = topic.downcast_mut::<Topic<M>>() {
			topic.subscribers.push(subscriber);
		}

		self
	}

	pub fn subscribe_domain(&mut self, subscriber: Arc<dyn DomainSubscriber>) -> &mut Self {
		self.domain_subscribers.push(subscriber);
		self
	}

	pub fn build(self) -> PubSub {
		PubSub {
			topics: self.topics,
			domain_subscribers: self.domain_subscribers,
		}
	}
}

pub struct PubSub {
	topics: HashMap<TopicKey, Box<dyn Any + Send + Sync>>,
	domain_subscribers: Vec<Arc<dyn DomainSubscriber>>,
}

impl PubSub {
	pub fn builder() -> PubSubBuilder {
		PubSubBuilder::default()
	}

	pub fn subscriber_count<M: Send + Sync + 'static>(&self, resource_type: ResourceType) -> usize {
		self.topic::<M>(resource_type)
			.map_or(0, |topic| topic.subscribers.len())
	}

	fn topic<M: Send + Sync + 'static>(&self, resource_type: ResourceType) -> Option<&Topic<M>> {
		self.topics
			.get(&(resource_type, TypeId::of::<M>()))
			.and_then(|topic| topic.downcast_ref::<Topic<M>>())
	}

	/// Delivers the message to every subscriber of the topic, returns how many handled it.
	/// A failing or panicking subscriber is logged and skipped.
	pub async fn publish<M: Send + Sync + 'static>(
		&self,
		resource_type: ResourceType,
		message: &ChangeMessage<M>,
	) -> usize {
		let Some(topic) = self.topic::<M>(resource_type) else {
			return 0;
		};

		let mut delivered = 0;

		for subscriber in &topic.subscribers {
			match AssertUnwindSafe(subscriber.on_message(message))
				.catch_unwind()
				.await
			{
				Ok(Ok(())) => delivered += 1,
				Ok(Err(e)) => error!(
					subscriber = subscriber.name(),
					%resource_type,
					kind = message.kind(),
					domain = %message.metadata.domain_lcuuid,
					?e,
					"Subscriber failed to handle change"
				),
				Err(_) => error!(
					subscriber = subscriber.name(),
					%resource_type,
					kind = message.kind(),
					domain = %message.metadata.domain_lcuuid,
					"Subscriber panicked while handling change"
				),
			}
		}

		trace!(%resource_type, kind = message.kind(), delivered, "Published change");

		delivered
	}

	pub async fn publish_domain(&self, message: &DomainMessage) -> usize {
		let mut delivered = 0;

		for subscriber in &self.domain_subscribers {
			match AssertUnwindSafe(subscriber.on_domain_message(message))
				.catch_unwind()
				.await
			{
				Ok(Ok(())) => delivered += 1,
				Ok(Err(e)) => error!(
					subscriber = subscriber.name(),
					domain = %message.metadata().domain_lcuuid,
					?e,
					"Subscriber failed to handle domain message"
				),
				Err(_) => error!(
					subscriber = subscriber.name(),
					domain = %message.metadata().domain_lcuuid,
					"Subscriber panicked while handling domain message"
				),
			}
		}

		delivered
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::Mutex;

	use crate::recorder::Metadata;

	fn metadata() -> Metadata {
		Metadata {
			org_id: 1,
			team_id: 1,
			domain_id: 1,
			domain_lcuuid: "d-1".into(),
			domain_name: "d".into(),
			sub_domain_id: None,
			sub_domain_lcuuid: None,
		}
	}

	#[derive(Default)]
	struct Recording {
		seen: Mutex<Vec<String>>,
	}

	#[async_trait]
	impl ResourceSubscriber<String> for Recording {
		fn name(&self) -> &str {
			"recording"
		}

		async fn on_message(&self, message: &ChangeMessage<String>) -> SubscriberResult {
			if let ResourceChange::Added(rows) = &message.change {
				self.seen.lock().unwrap().extend(rows.iter().cloned());
			}
			Ok(())
		}
	}

	struct Panicking;

	#[async_trait]
	impl ResourceSubscriber<String> for Panicking {
		fn name(&self) -> &str {
			"panicking"
		}

		async fn on_message(&self, _: &ChangeMessage<String>) -> SubscriberResult {
			panic!("boom");
		}
	}

	struct Failing;

	#[async_trait]
	impl ResourceSubscriber<String> for Failing {
		fn name(&self) -> &str {
			"failing"
		}

		async fn on_message(&self, _: &ChangeMessage<String>) -> SubscriberResult {
			Err(SubscriberError::Rejected("nope".into()))
		}
	}

	#[tokio::test]
	async fn test_publish_isolates_failures() {
		let recording = Arc::new(Recording::default());

		let mut builder = PubSub::builder();
		builder
			.subscribe::<String>(ResourceType::Vm, Arc::new(Panicking))
			.subscribe::<String>(ResourceType::Vm, Arc::new(Failing))
			.subscribe::<String>(ResourceType::Vm, recording.clone());
		let pubsub = builder.build();

		let delivered = pubsub
			.publish(
				ResourceType::Vm,
				&ChangeMessage::added(metadata(), vec!["m-1".to_string()]),
			)
			.await;

		assert_eq!(delivered, 1);
		assert_eq!(*recording.seen.lock().unwrap(), vec!["m-1".to_string()]);
	}

	#[tokio::test]
	async fn test_topics_are_per_resource_and_row_type() {
		let recording = Arc::new(Recording::default());

		let mut builder = PubSub::builder();
		builder.subscribe::<String>(ResourceType::Vm, recording.clone());
		let pubsub = builder.build();

		assert_eq!(pubsub.subscriber_count::<String>(ResourceType::Vm), 1);
		assert_eq!(pubsub.subscriber_count::<i32>(ResourceType::Vm), 0);

		let delivered = pubsub
			.publish(
				ResourceType::Host,
				&ChangeMessage::added(metadata(), vec!["h-1".to_string()]),
			)
			.await;

		assert_eq!(delivered, 0);
		assert!(recording.seen.lock().unwrap().is_empty());
	}
}
