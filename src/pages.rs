//! Server-rendered HTML.
//!
//! The chat page carries the element ids the widget binds to by default:
//! `chat-form`, `user-input`, `send-btn` and `chat-box`.

/// Wraps `content` in the page skeleton.
pub fn html_shell(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="Shopping assistant for our product catalogue">
    <title>{title} - Storefront</title>
    <link rel="stylesheet" href="/static/style.css">
</head>
<body>
    <main class="page">
        {content}
    </main>
</body>
</html>"#
    )
}

/// Chat page content.
pub fn chat_content() -> &'static str {
    r#"
        <section class="chat-container">
            <header class="chat-header">
                <h1>Shopping Assistant</h1>
                <p>Ask about products, prices and availability.</p>
            </header>

            <div id="chat-box" class="chat-box" aria-live="polite"></div>

            <form id="chat-form" class="chat-form" autocomplete="off">
                <input id="user-input" type="text" name="message"
                       placeholder="Ask about our products..." aria-label="Message">
                <button id="send-btn" type="submit">Send</button>
            </form>
        </section>
    "#
}

pub fn index_page() -> String {
    html_shell("Chat", chat_content())
}
