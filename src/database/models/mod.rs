pub mod agent;
pub mod agent_metric;
pub mod conversation;
pub mod enums;
pub mod message;
pub mod whatsapp_session;

pub use agent::Agent;
pub use agent_metric::AgentMetric;
pub use conversation::Conversation;
pub use message::Message;
pub use whatsapp_session::WhatsAppSession;
