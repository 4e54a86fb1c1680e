//! The chat widget controller.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use scraper::Selector;
use thiserror::Error;
use tracing::{error, warn};

use super::dom::{Document, Event};
use super::transport::{ChatReply, ChatRequest, ChatTransport};

/// Text rendered when the request could not be delivered.
pub const NETWORK_ERROR_REPLY: &str = "Network error while contacting the server.";

/// Sender of a message; doubles as the bubble's style class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Ai,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }

    /// Class list of a bubble for this role.
    pub fn bubble_class(self) -> String {
        format!("msg {}", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The UI handles a widget binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Form,
    Input,
    SendButton,
    Container,
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Form => "form",
            Self::Input => "input",
            Self::SendButton => "send button",
            Self::Container => "message container",
        })
    }
}

/// Primary element id plus the selector list tried when the id is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleSpec {
    pub id: String,
    pub fallback: String,
}

impl HandleSpec {
    pub fn new(id: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fallback: fallback.into(),
        }
    }
}

/// Where each handle is looked up. Resolved once, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetBindings {
    pub form: HandleSpec,
    pub input: HandleSpec,
    pub send_button: HandleSpec,
    pub container: HandleSpec,
}

impl Default for WidgetBindings {
    fn default() -> Self {
        Self {
            form: HandleSpec::new("chat-form", "form"),
            input: HandleSpec::new(
                "user-input",
                r#"input[type="text"], input[type="search"], textarea"#,
            ),
            send_button: HandleSpec::new("send-btn", r#"button[type="submit"], button"#),
            container: HandleSpec::new(
                "chat-box",
                ".chat-box, .messages, .chat-window, .chat, .conversation",
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AttachError {
    #[error("chat elements not found: {}", list_handles(.0))]
    MissingElements(Vec<Handle>),
    #[error("invalid fallback selector {selector:?} for {handle}: {reason}")]
    InvalidSelector {
        handle: Handle,
        selector: String,
        reason: String,
    },
}

fn list_handles(handles: &[Handle]) -> String {
    handles
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Which path a send attempt took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to send.
    Empty,
    /// Another send is still in flight; this one was dropped.
    Busy,
    /// The server answered; `text` is what was rendered.
    Replied { text: String },
    /// The request failed below HTTP.
    NetworkError,
}

/// Chat controller bound to a page.
///
/// Renders the user's message immediately, posts it through the transport
/// and renders the reply. At most one request is in flight at a time.
pub struct ChatWidget<D: Document, T> {
    doc: Rc<D>,
    transport: T,
    form: D::Element,
    input: D::Element,
    send_button: D::Element,
    container: Option<D::Element>,
    in_flight: AtomicBool,
}

impl<D: Document, T> fmt::Debug for ChatWidget<D, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatWidget")
            .field("form", &self.form)
            .field("input", &self.input)
            .field("send_button", &self.send_button)
            .field("container", &self.container)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

fn resolve<D: Document>(
    doc: &D,
    handle: Handle,
    spec: &HandleSpec,
) -> Result<Option<D::Element>, AttachError> {
    if let Some(el) = doc.get_element_by_id(&spec.id) {
        return Ok(Some(el));
    }
    let fallback = Selector::parse(&spec.fallback).map_err(|e| {
        error!(
            handle = %handle,
            selector = %spec.fallback,
            error = %e,
            "Invalid fallback selector; chat widget not attached."
        );
        AttachError::InvalidSelector {
            handle,
            selector: spec.fallback.clone(),
            reason: e.to_string(),
        }
    })?;
    Ok(doc.query_selector(&fallback))
}

impl<D: Document, T: ChatTransport> ChatWidget<D, T> {
    /// Resolves the handles described by `bindings` and binds to them.
    ///
    /// Fails without touching the page when the form, the input or the send
    /// button cannot be found. A missing message container is allowed.
    pub fn attach(doc: Rc<D>, transport: T, bindings: &WidgetBindings) -> Result<Self, AttachError> {
        let form = resolve(&*doc, Handle::Form, &bindings.form)?;
        let input = resolve(&*doc, Handle::Input, &bindings.input)?;
        let send_button = resolve(&*doc, Handle::SendButton, &bindings.send_button)?;
        let container = resolve(&*doc, Handle::Container, &bindings.container)?;

        let (Some(form), Some(input), Some(send_button)) =
            (form.clone(), input.clone(), send_button.clone())
        else {
            let missing: Vec<Handle> = [
                (Handle::Form, form.is_none()),
                (Handle::Input, input.is_none()),
                (Handle::SendButton, send_button.is_none()),
            ]
            .into_iter()
            .filter_map(|(h, absent)| absent.then_some(h))
            .collect();
            error!(
                missing = %list_handles(&missing),
                "Chat elements not found. Ensure your page has a form, an input, and a button."
            );
            return Err(AttachError::MissingElements(missing));
        };

        Ok(Self {
            doc,
            transport,
            form,
            input,
            send_button,
            container,
            in_flight: AtomicBool::new(false),
        })
    }

    pub fn document(&self) -> &Rc<D> {
        &self.doc
    }

    pub fn form(&self) -> &D::Element {
        &self.form
    }

    pub fn input(&self) -> &D::Element {
        &self.input
    }

    pub fn send_button(&self) -> &D::Element {
        &self.send_button
    }

    pub fn container(&self) -> Option<&D::Element> {
        self.container.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Renders a bubble for `text`.
    ///
    /// Goes into the message container (scrolled to the bottom), or right
    /// before the form when the page has no container.
    pub fn add_message(&self, text: &str, role: Role) {
        let bubble = self.doc.create_element("div");
        self.doc.set_class_name(&bubble, &role.bubble_class());
        self.doc.set_text_content(&bubble, text);

        if let Some(list) = &self.container {
            self.doc.append_child(list, &bubble);
            self.doc.scroll_to_bottom(list);
        } else if let Some(parent) = self.doc.parent(&self.form) {
            self.doc.insert_before(&parent, &bubble, &self.form);
        } else {
            warn!(role = %role, "chat form is detached; bubble not rendered");
        }
    }

    /// Sends `message` and renders the exchange.
    ///
    /// `message` is expected to be trimmed already; an empty one is ignored.
    pub async fn send_message(&self, message: &str) -> SendOutcome {
        if message.is_empty() {
            return SendOutcome::Empty;
        }
        let Some(_scope) = SendScope::enter(self) else {
            warn!("chat request already in flight; ignoring send");
            return SendOutcome::Busy;
        };

        self.add_message(message, Role::User);
        self.doc.set_value(&self.input, "");
        self.doc.focus(&self.input);

        let req = ChatRequest {
            message: message.to_string(),
        };
        match self.transport.post_chat(&req).await {
            Ok(raw) => {
                let reply = ChatReply::from_body(raw.body.as_deref());
                let text = reply.display_text().to_string();
                self.add_message(&text, Role::Ai);
                SendOutcome::Replied { text }
            }
            Err(e) => {
                error!(error = %e, "chat request failed");
                self.add_message(NETWORK_ERROR_REPLY, Role::Ai);
                SendOutcome::NetworkError
            }
        }
    }

    /// Form submission: suppresses the browser submit and sends the input.
    pub async fn on_submit(&self, event: &mut Event) -> SendOutcome {
        event.prevent_default();
        let message = self.read_input();
        self.send_message(&message).await
    }

    /// Click on the send button.
    ///
    /// Submit-type buttons are left to the form submission path and yield
    /// `None`; any other button sends directly.
    pub async fn on_click(&self, event: &mut Event) -> Option<SendOutcome> {
        if self.doc.attribute(&self.send_button, "type").as_deref() == Some("submit") {
            return None;
        }
        event.prevent_default();
        let message = self.read_input();
        Some(self.send_message(&message).await)
    }

    fn read_input(&self) -> String {
        self.doc.value(&self.input).trim().to_string()
    }
}

/// Holds the in-flight flag and the send button's disabled state for the
/// duration of one request. Dropping it restores both, including when the
/// send future is dropped mid-request.
struct SendScope<'a, D: Document> {
    doc: &'a D,
    button: &'a D::Element,
    flag: &'a AtomicBool,
    was_disabled: bool,
}

impl<'a, D: Document> SendScope<'a, D> {
    fn enter<T>(widget: &'a ChatWidget<D, T>) -> Option<Self> {
        widget
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let doc = &*widget.doc;
        let was_disabled = doc.is_disabled(&widget.send_button);
        doc.set_disabled(&widget.send_button, true);
        Some(Self {
            doc,
            button: &widget.send_button,
            flag: &widget.in_flight,
            was_disabled,
        })
    }
}

impl<D: Document> Drop for SendScope<'_, D> {
    fn drop(&mut self) {
        self.doc.set_disabled(self.button, self.was_disabled);
        self.flag.store(false, Ordering::Release);
    }
}
