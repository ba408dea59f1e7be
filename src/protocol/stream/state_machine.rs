use crate::protocol::stream::types::{next_stream_commands, StreamCommand, StreamInput, StreamState};

/// Pure stream state machine: transitions only, no I/O.
pub struct StreamStateMachine {
    state: StreamState,
}

impl StreamStateMachine {
    pub fn new() -> Self {
        Self {
            state: StreamState::AwaitingStart,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn process_event(&self, input: StreamInput<'_>) -> Vec<StreamCommand> {
        next_stream_commands(self.state, input)
    }

    pub fn apply_commands(&mut self, commands: &[StreamCommand]) {
        for command in commands {
            if let StreamCommand::Transition(next) = command {
                self.state = *next;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn advance(&mut self, input: StreamInput<'_>) -> Vec<StreamCommand> {
        let commands = self.process_event(input);
        self.apply_commands(&commands);
        commands
    }
}

impl Default for StreamStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
