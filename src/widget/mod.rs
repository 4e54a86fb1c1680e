//! Chat widget controller.
//!
//! The widget binds to a form, a text input, a send button and an optional
//! message list on a page, posts what the user types to the chat endpoint
//! and renders the exchange as message bubbles.
//!
//! # Structure
//!
//! - [`controller`]: [`ChatWidget`] itself, handle resolution and send flow
//! - [`dom`]: the [`Document`] page abstraction and [`MemoryDocument`], a
//!   page parsed with `scraper` whose fallback lookups are CSS selector lists
//! - [`transport`]: [`ChatTransport`] and the reqwest [`HttpTransport`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use storefront_chat::widget::{ChatWidget, Event, HttpTransport, MemoryDocument, WidgetBindings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let page = Rc::new(MemoryDocument::chat_page());
//! let transport = HttpTransport::new("http://127.0.0.1:5000", "/chat")?;
//! let widget = ChatWidget::attach(page, transport, &WidgetBindings::default())?;
//! widget.send_message("Do you have running shoes?").await;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod dom;
pub mod transport;

pub use controller::{
    AttachError, ChatWidget, Handle, HandleSpec, NETWORK_ERROR_REPLY, Role, SendOutcome,
    WidgetBindings,
};
pub use dom::{Document, Event, MemoryDocument, NodeId};
pub use transport::{
    ChatReply, ChatRequest, ChatTransport, DEFAULT_ENDPOINT, EMPTY_REPLY, HttpTransport,
    NO_JSON_REPLY, RawReply, TransportError,
};
