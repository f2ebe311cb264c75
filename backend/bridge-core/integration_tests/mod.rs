mod command_channel;
mod end_to_end;
mod event_stream;
mod helpers;
mod host;
mod transport;
