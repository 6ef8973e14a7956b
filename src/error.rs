use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Rule already exists: {name}"))]
    DuplicateRuleName { name: String },

    #[snafu(display("Rule not found: {name}"))]
    RuleNotFound { name: String },

    #[snafu(display("Resource not found: {resource}"))]
    NotFound { resource: String },

    #[snafu(display("Resource already exists: {resource}"))]
    AlreadyExists { resource: String },

    #[snafu(display("Invalid parameter: {message}"))]
    InvalidParameter { message: String },

    #[snafu(display("Message is not awaiting settlement: {message_id}"))]
    MessageNotInFlight { message_id: String },
}

impl Error {
    pub fn duplicate_rule(name: impl Into<String>) -> Self {
        Self::DuplicateRuleName { name: name.into() }
    }

    pub fn rule_not_found(name: impl Into<String>) -> Self {
        Self::RuleNotFound { name: name.into() }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn queue_not_found(queue: impl Into<String>) -> Self {
        Self::NotFound {
            resource: format!("queue {}", queue.into()),
        }
    }

    pub fn topic_not_found(topic: impl Into<String>) -> Self {
        Self::NotFound {
            resource: format!("topic {}", topic.into()),
        }
    }

    pub fn subscription_not_found(
        subscription: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource: format!(
                "subscription {} on topic {}",
                subscription.into(),
                topic.into()
            ),
        }
    }

    pub fn message_not_in_flight(message_id: impl Into<String>) -> Self {
        Self::MessageNotInFlight {
            message_id: message_id.into(),
        }
    }
}
