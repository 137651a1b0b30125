use crate::structure::reliability_kind::ReliabilityKind;
use crate::structure::topic_kind::TopicKind;

/// Describes what an endpoint publishes or subscribes to. Matching in
/// SEDP compares `topic_name` and `type_name` by string equality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicData {
  pub topic_name: String,
  pub type_name: String,
  pub reliability: ReliabilityKind,
  pub topic_kind: TopicKind,
}

impl TopicData {
  pub fn new(
    topic_name: &str,
    type_name: &str,
    reliability: ReliabilityKind,
    topic_kind: TopicKind,
  ) -> Self {
    Self {
      topic_name: topic_name.to_string(),
      type_name: type_name.to_string(),
      reliability,
      topic_kind,
    }
  }

  pub fn matches(&self, other: &TopicData) -> bool {
    self.matches_names(&other.topic_name, &other.type_name)
  }

  pub fn matches_names(&self, topic_name: &str, type_name: &str) -> bool {
    self.topic_name == topic_name && self.type_name == type_name
  }
}
