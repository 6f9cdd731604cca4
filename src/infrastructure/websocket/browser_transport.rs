use crate::application::ports::SocketTransport;
use crate::domain::{
    errors::{SyncError, SyncResult},
    events::{ConnectionId, DashboardEvent, EventDispatcher, SocketEvent, SocketEventKind},
    logging::LogComponent,
};
use crate::{log_debug, log_warn};
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

const COMPONENT: LogComponent = LogComponent::Infrastructure("WebSocket");

/// Browser socket plus the callbacks that must outlive it
struct SocketHandle {
    socket: WebSocket,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl SocketHandle {
    fn detach(&self) {
        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onerror(None);
        self.socket.set_onclose(None);
    }
}

/// `web_sys::WebSocket` transport. Every callback is tagged with the
/// [`ConnectionId`] it was created for and forwarded as a [`SocketEvent`].
pub struct BrowserSocketTransport {
    dispatcher: Rc<dyn EventDispatcher>,
    sockets: HashMap<ConnectionId, SocketHandle>,
}

impl BrowserSocketTransport {
    pub fn new(dispatcher: Rc<dyn EventDispatcher>) -> Self {
        Self { dispatcher, sockets: HashMap::new() }
    }

    fn forward(dispatcher: Rc<dyn EventDispatcher>, connection: ConnectionId) -> impl Fn(SocketEventKind) + 'static {
        move |kind| dispatcher.dispatch(DashboardEvent::Socket(SocketEvent::new(connection, kind)))
    }

    /// Handlers may be running right now (a close handled synchronously ends up
    /// here), so the closures are dropped from a later task.
    fn retire(&mut self, connection: ConnectionId) -> Option<WebSocket> {
        let handle = self.sockets.remove(&connection)?;
        handle.detach();
        let socket = handle.socket.clone();
        spawn_local(async move {
            drop(handle);
        });
        Some(socket)
    }
}

impl SocketTransport for BrowserSocketTransport {
    fn connect(&mut self, connection: ConnectionId, url: &str) -> SyncResult<()> {
        let socket = WebSocket::new(url)
            .map_err(|e| SyncError::Connection(format!("Failed to create WebSocket connection: {e:?}")))?;

        let emit = Self::forward(Rc::clone(&self.dispatcher), connection);
        let on_open = Closure::wrap(Box::new(move |_: Event| emit(SocketEventKind::Opened)) as Box<dyn FnMut(Event)>);

        let emit = Self::forward(Rc::clone(&self.dispatcher), connection);
        let on_message = Closure::wrap(Box::new(move |event: MessageEvent| match event.data().as_string() {
            Some(text) => emit(SocketEventKind::Message(text)),
            None => {
                log_debug!(COMPONENT, "Ignoring non-text frame");
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        let emit = Self::forward(Rc::clone(&self.dispatcher), connection);
        let on_error = Closure::wrap(Box::new(move |event: Event| {
            emit(SocketEventKind::Error(event.type_()));
        }) as Box<dyn FnMut(Event)>);

        let emit = Self::forward(Rc::clone(&self.dispatcher), connection);
        let on_close = Closure::wrap(Box::new(move |event: CloseEvent| {
            emit(SocketEventKind::Closed { code: event.code(), reason: event.reason() });
        }) as Box<dyn FnMut(CloseEvent)>);

        socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        self.sockets.insert(
            connection,
            SocketHandle {
                socket,
                _on_open: on_open,
                _on_message: on_message,
                _on_error: on_error,
                _on_close: on_close,
            },
        );
        Ok(())
    }

    fn send(&mut self, connection: ConnectionId, payload: &str) -> SyncResult<()> {
        let handle = self.sockets.get(&connection).ok_or(SyncError::NotConnected)?;
        handle
            .socket
            .send_with_str(payload)
            .map_err(|e| SyncError::Connection(format!("Failed to send message: {e:?}")))
    }

    fn close(&mut self, connection: ConnectionId, code: u16, reason: &str) {
        if let Some(socket) = self.retire(connection) {
            if let Err(e) = socket.close_with_code_and_reason(code, reason) {
                log_warn!(COMPONENT, "Failed to close socket {}: {e:?}", connection.0);
            }
        }
    }

    fn release(&mut self, connection: ConnectionId) {
        self.retire(connection);
    }
}
