/*!
    bridge side routing of requests to components

    the [Dispatcher] is the message handler of a bridge's transport. It holds a registry of [Component]s indexed by component identifier, built once at startup. Each request is handed to its component synchronously, and the reply it writes is sent as the one response to that request.

    requests for an unknown component or operation are logged, counted and dropped without response: the host is expected to time out
*/

use core::ops::{Deref, DerefMut};
use log::*;

use crate::{
    driver::BlockDriver,
    protocol::{Status, CapacityError, Writer, response},
    transport::{Message, Link, MessageHandler},
    };


/// result of a component handling a request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// the reply has been written and must be sent
    Replied,
    /// the operation does not exist in this component, no response is sent
    NotImplemented,
}

/// a peripheral served by the bridge
pub trait Component {
    /**
        execute `request` and write its response payload in `reply`, status first

        peripheral failures must be reported in the status, the request/response cycle completes anyway
    */
    fn handle(&mut self, request: &Message<'_>, reply: &mut Reply<'_>) -> Result<Outcome, CapacityError>;
}

/// response being written by a component, sharing the send buffer of the transport
pub struct Reply<'b> {
    operation: u8,
    writer: Writer<'b>,
}
impl<'b> Reply<'b> {
    pub fn new(operation: u8, buffer: &'b mut [u8]) -> Self {
        Self {operation, writer: Writer::new(buffer)}
    }
    /// operation of the response, defaults to the request operation with the response bit set
    pub fn operation(&self) -> u8 {self.operation}
    pub fn set_operation(&mut self, operation: u8) {self.operation = operation}
    /// append a status byte
    pub fn status(&mut self, status: Status) -> Result<&mut Writer<'b>, CapacityError> {
        self.writer.pack(status)
    }
}
impl<'b> Deref for Reply<'b> {
    type Target = Writer<'b>;
    fn deref(&self) -> &Self::Target {&self.writer}
}
impl DerefMut for Reply<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {&mut self.writer}
}


/// counters of dispatched requests
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// requests answered by a component
    pub handled: u32,
    /// requests dropped because no component is registered with their identifier
    pub unknown_component: u32,
    /// requests dropped because their component does not implement their operation
    pub unknown_operation: u32,
    /// requests dropped because the previous response was still being sent
    pub overrun: u32,
}

/// registry of up to `C` components, routing requests to them
pub struct Dispatcher<'c, const C: usize = 4> {
    components: heapless::Vec<(u8, &'c mut dyn Component), C>,
    stats: Stats,
}

impl<'c, const C: usize> Dispatcher<'c, C> {
    pub fn new() -> Self {
        Self {
            components: heapless::Vec::new(),
            stats: Stats::default(),
        }
    }
    /**
        register a component under the given identifier

        panics if this identifier is already registered, fails if the registry is full
    */
    pub fn register(&mut self, id: impl Into<u8>, component: &'c mut dyn Component) -> Result<&mut Self, CapacityError> {
        let id = id.into();
        assert!(self.get(id).is_none(), "component {:#04x} registered twice", id);
        self.components.push((id, component)).map_err(|_| CapacityError)?;
        Ok(self)
    }
    /// component registered with the given identifier
    pub fn get(&self, id: u8) -> Option<&dyn Component> {
        self.components.iter()
            .find(|(registered, _)| *registered == id)
            .map(|(_, component)| &**component)
    }
    pub fn stats(&self) -> Stats {self.stats}

    /// route a request and send the response of its component, if any
    pub fn dispatch<D: BlockDriver, const N: usize>(&mut self, request: &Message<'_>, link: &mut Link<D, N>) {
        let Some((_, component)) = self.components.iter_mut()
            .find(|(id, _)| *id == request.component)
        else {
            warn!("no component {:#04x}, request dropped", request.component);
            self.stats.unknown_component = self.stats.unknown_component.saturating_add(1);
            return
        };
        if link.is_busy() {
            warn!("previous response is still being sent, request dropped");
            self.stats.overrun = self.stats.overrun.saturating_add(1);
            return
        }
        debug!("dispatch {:?}", request.header());

        let mut reply = Reply::new(response(request.operation), link.payload_mut());
        let outcome = match component.handle(request, &mut reply) {
            Ok(outcome) => outcome,
            Err(CapacityError) => {
                warn!("response to {:?} does not fit in send buffer", request.header());
                reply.clear();
                reply.set_operation(response(request.operation));
                reply.status(Status::UnknownError).ok();
                Outcome::Replied
            },
        };
        match outcome {
            Outcome::NotImplemented => {
                warn!("component {:#04x} has no operation {:#04x}, request dropped", request.component, request.operation);
                self.stats.unknown_operation = self.stats.unknown_operation.saturating_add(1);
            },
            Outcome::Replied => {
                let (operation, length) = (reply.operation(), reply.len());
                self.stats.handled = self.stats.handled.saturating_add(1);
                if let Err(error) = link.commit(request.component, operation, request.channel, length) {
                    warn!("cannot send response: {}", error);
                }
            },
        }
    }
}
impl<const C: usize> Default for Dispatcher<'_, C> {
    fn default() -> Self {Self::new()}
}

impl<D: BlockDriver, const C: usize, const N: usize> MessageHandler<D, N> for Dispatcher<'_, C> {
    fn on_message(&mut self, message: &Message<'_>, link: &mut Link<D, N>) {
        self.dispatch(message, link)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        driver::Deferred,
        protocol::{Component as Id, PROTOCOL_VERSION, bridge},
        transport::Transport,
        };

    /// minimal bridge component answering the protocol version
    struct Version;
    impl Component for Version {
        fn handle(&mut self, request: &Message<'_>, reply: &mut Reply<'_>) -> Result<Outcome, CapacityError> {
            match request.operation {
                bridge::GET_PROTOCOL_VERSION => {
                    reply.status(Status::Ok)?.pack(PROTOCOL_VERSION)?;
                    Ok(Outcome::Replied)
                },
                _ => Ok(Outcome::NotImplemented),
            }
        }
    }
    /// component writing more than any buffer can hold
    struct Greedy;
    impl Component for Greedy {
        fn handle(&mut self, _request: &Message<'_>, reply: &mut Reply<'_>) -> Result<Outcome, CapacityError> {
            reply.status(Status::Ok)?.put(&[0; 64])?;
            Ok(Outcome::Replied)
        }
    }

    fn receive<H: MessageHandler<Deferred, 32>>(transport: &mut Transport<Deferred, H, 32>, frame: &[u8]) {
        let (header, payload) = frame.split_at(5);
        transport.armed_receive().copy_from_slice(header);
        transport.block_received().unwrap();
        if !payload.is_empty() {
            transport.armed_receive().copy_from_slice(payload);
            transport.block_received().unwrap();
        }
    }

    #[test]
    fn route_to_component() {
        let mut version = Version;
        let mut dispatcher = Dispatcher::<2>::new();
        dispatcher.register(Id::Bridge, &mut version).unwrap();
        let mut transport = Transport::<_, _, 32>::new(Deferred, dispatcher);

        // two consecutive requests give two independent responses
        for _ in 0 .. 2 {
            receive(&mut transport, &[0x00, 0x00, 0x00, 0x00, 0x00]);
            assert_eq!(transport.armed_send(), Some(&[0x00, 0x80, 0x00, 0x00, 0x02, 0x00, PROTOCOL_VERSION][..]));
            transport.block_sent();
        }
        assert_eq!(transport.handler().stats().handled, 2);
    }

    #[test]
    fn unknown_requests_are_dropped() {
        let mut version = Version;
        let mut dispatcher = Dispatcher::<2>::new();
        dispatcher.register(Id::Bridge, &mut version).unwrap();
        let mut transport = Transport::<_, _, 32>::new(Deferred, dispatcher);

        receive(&mut transport, &[0x42, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(transport.armed_send(), None);
        receive(&mut transport, &[0x00, 0x63, 0x00, 0x00, 0x01, 0xff]);
        assert_eq!(transport.armed_send(), None);

        let stats = transport.handler().stats();
        assert_eq!(stats.unknown_component, 1);
        assert_eq!(stats.unknown_operation, 1);
        assert_eq!(stats.handled, 0);
        // registry is untouched
        assert!(transport.handler().get(0x00).is_some());
    }

    #[test]
    fn oversized_reply_becomes_error_status() {
        let mut greedy = Greedy;
        let mut dispatcher = Dispatcher::<1>::new();
        dispatcher.register(Id::SpiMaster, &mut greedy).unwrap();
        let mut transport = Transport::<_, _, 32>::new(Deferred, dispatcher);

        receive(&mut transport, &[0x02, 0x04, 0x01, 0x00, 0x00]);
        assert_eq!(transport.armed_send(), Some(&[0x02, 0x84, 0x01, 0x00, 0x01, 0x01][..]));
    }

    #[test]
    fn busy_link_drops_request() {
        let mut version = Version;
        let mut dispatcher = Dispatcher::<1>::new();
        dispatcher.register(Id::Bridge, &mut version).unwrap();
        let mut transport = Transport::<_, _, 32>::new(Deferred, dispatcher);

        receive(&mut transport, &[0x00, 0x00, 0x00, 0x00, 0x00]);
        receive(&mut transport, &[0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(transport.handler().stats().overrun, 1);
    }

    #[test]
    #[should_panic]
    fn duplicate_registration() {
        let (mut first, mut second) = (Version, Version);
        let mut dispatcher = Dispatcher::<2>::new();
        dispatcher.register(Id::Bridge, &mut first).unwrap();
        dispatcher.register(Id::Bridge, &mut second).unwrap();
    }

    #[test]
    fn full_registry() {
        let (mut first, mut second) = (Version, Greedy);
        let mut dispatcher = Dispatcher::<1>::new();
        dispatcher.register(Id::Bridge, &mut first).unwrap();
        assert!(dispatcher.register(Id::SpiMaster, &mut second).is_err());
    }
}
