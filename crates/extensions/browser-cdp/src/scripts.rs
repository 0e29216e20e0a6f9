//! Page-side JavaScript.
//!
//! Element primitives are function declarations run with
//! `Runtime.callFunctionOn`, `this` bound to the element. Document-level
//! snippets are function expressions applied to JSON-encoded arguments with
//! [`invoke`].

use serde_json::Value;

/// Name of the isolated world promptcast runs in.
pub const WORLD_NAME: &str = "promptcast";

/// Binding receiving mutation notifications (payload: observer token).
pub const MUTATION_BINDING: &str = "__promptcastMutation";

/// Binding receiving page-global messages (payload: JSON message).
pub const MESSAGE_BINDING: &str = "__promptcastMessage";

/// Apply a function expression to JSON-encoded arguments.
pub fn invoke(function: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("({})({})", function, args.join(", "))
}

pub const FIND_ELEMENT: &str = r#"(selector, requireVisible) => {
    const visible = (el) => {
        if (!el.isConnected) return false;
        const style = getComputedStyle(el);
        if (style.display === "none" || style.visibility === "hidden") return false;
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    };
    for (const el of document.querySelectorAll(selector)) {
        if (!requireVisible || visible(el)) return el;
    }
    return null;
}"#;

pub const FIND_ENABLED_CONTROL: &str = r#"(selector) => {
    for (const el of document.querySelectorAll(selector)) {
        const button = el.closest("button") || el;
        if (button.disabled) continue;
        if (button.getAttribute("aria-disabled") === "true") continue;
        return button;
    }
    return null;
}"#;

pub const DESCRIBE: &str = r##"function() {
    const tag = this.tagName.toLowerCase();
    const valueControl = (tag === "textarea" || tag === "input") && !this.isContentEditable;
    let label = tag;
    if (this.id) label += "#" + this.id;
    if (typeof this.className === "string" && this.className.trim()) {
        label += "." + this.className.trim().split(/\s+/).slice(0, 3).join(".");
    }
    return { valueControl, label };
}"##;

pub const FOCUS: &str = "function() { this.focus(); }";

pub const VALUE: &str = r#"function() { return typeof this.value === "string" ? this.value : ""; }"#;

pub const RENDERED_TEXT: &str = r#"function() { return this.innerText || this.textContent || ""; }"#;

pub const WRITE_VALUE_VIA_PROTOTYPE: &str = r#"function(text) {
    const proto = this instanceof HTMLTextAreaElement
        ? HTMLTextAreaElement.prototype
        : HTMLInputElement.prototype;
    const descriptor = Object.getOwnPropertyDescriptor(proto, "value");
    if (descriptor && descriptor.set) {
        descriptor.set.call(this, text);
    } else {
        this.value = text;
    }
}"#;

pub const PRIME_VALUE_TRACKER: &str = r#"function(previous) {
    const tracker = this._valueTracker;
    if (!tracker || typeof tracker.setValue !== "function") return false;
    tracker.setValue(previous);
    return true;
}"#;

pub const DISPATCH: &str = r#"function(spec) {
    const init = { bubbles: true, cancelable: true, composed: true };
    let event;
    try {
        switch (spec.family) {
            case "focus":
                event = new FocusEvent(spec.type, init);
                break;
            case "keyboard":
                event = new KeyboardEvent(spec.type, { ...init, key: spec.key, code: spec.code });
                break;
            case "input":
                event = new InputEvent(spec.type, { ...init, inputType: "insertText", data: spec.data });
                break;
            case "composition":
                event = new CompositionEvent(spec.type, { ...init, data: spec.data });
                break;
            case "clipboard": {
                const transfer = new DataTransfer();
                transfer.setData("text/plain", spec.data);
                event = new ClipboardEvent(spec.type, { ...init, clipboardData: transfer });
                break;
            }
            default:
                event = new Event(spec.type, init);
        }
    } catch (e) {
        return false;
    }
    this.dispatchEvent(event);
    return true;
}"#;

pub const INVOKE_COMPONENT_CHANGE_HANDLER: &str = r#"function(text) {
    const key = Object.keys(this).find(
        (k) => k.startsWith("__reactFiber$") || k.startsWith("__reactInternalInstance$")
    );
    let node = key ? this[key] : null;
    while (node) {
        const props = node.memoizedProps || node.pendingProps;
        if (props && typeof props.onChange === "function") {
            props.onChange({
                target: { value: text },
                currentTarget: { value: text },
                preventDefault() {},
                stopPropagation() {},
                persist() {},
            });
            return true;
        }
        node = node.return;
    }
    return false;
}"#;

pub const SELECT_ALL: &str = r#"function() {
    this.focus();
    if (typeof this.select === "function") {
        this.select();
        return;
    }
    const range = document.createRange();
    range.selectNodeContents(this);
    const selection = window.getSelection();
    selection.removeAllRanges();
    selection.addRange(range);
}"#;

pub const INSERT_TEXT: &str =
    r#"function(text) { return document.execCommand("insertText", false, text); }"#;

pub const REPLACE_WITH_PARAGRAPH: &str = r#"function(text) {
    const paragraph = document.createElement("p");
    paragraph.textContent = text;
    this.replaceChildren(paragraph);
}"#;

pub const ASSIGN_TEXT: &str = r#"function(text) {
    if (!this.isContentEditable && "value" in this) {
        this.value = text;
    } else {
        this.textContent = text;
    }
}"#;

pub const PLACE_CARET_AT_END: &str = r#"function() {
    if (typeof this.setSelectionRange === "function") {
        const end = this.value.length;
        this.setSelectionRange(end, end);
    }
}"#;

/// Background tabs do not run animation frames; the timer bounds the wait.
pub const NEXT_FRAME: &str = r#"function() {
    return new Promise((resolve) => {
        requestAnimationFrame(() => resolve(true));
        setTimeout(() => resolve(false), 100);
    });
}"#;

pub const ENABLED_FORM_BUTTON: &str = r#"function() {
    const form = this.closest("form");
    if (!form) return null;
    for (const button of form.querySelectorAll("button")) {
        if (!button.disabled) return button;
    }
    return null;
}"#;

pub const SUBMIT_ENCLOSING_FORM: &str = r#"function() {
    const form = this.closest("form");
    if (!form) return false;
    form.dispatchEvent(new Event("submit", { bubbles: true, cancelable: true }));
    return true;
}"#;

pub const CLICK: &str = "function() { this.click(); }";

pub const WATCH_MUTATIONS: &str = r#"(binding, token) => {
    const registry = (globalThis.__promptcastObservers ||= {});
    const observer = new MutationObserver(() => globalThis[binding](String(token)));
    observer.observe(document.body || document.documentElement, {
        childList: true,
        subtree: true,
        attributes: true,
    });
    registry[token] = observer;
    return true;
}"#;

pub const UNWATCH_MUTATIONS: &str = r#"(token) => {
    const registry = globalThis.__promptcastObservers || {};
    if (registry[token]) {
        registry[token].disconnect();
        delete registry[token];
    }
    return true;
}"#;

/// Forward every same-window message to the binding, once per context.
pub const LISTEN_MESSAGES: &str = r#"(binding) => {
    if (globalThis.__promptcastListening) return false;
    globalThis.__promptcastListening = true;
    window.addEventListener("message", (event) => {
        if (event.source !== window) return;
        try {
            globalThis[binding](JSON.stringify(event.data));
        } catch (e) {}
    });
    return true;
}"#;

pub const POST_MESSAGE: &str = r#"(message) => { window.postMessage(message, "*"); return true; }"#;

pub const HOSTNAME: &str = "location.hostname";

pub const READY_STATE: &str = "document.readyState";

pub const DOCUMENT_STATE: &str = "({ state: document.readyState, href: location.href })";
