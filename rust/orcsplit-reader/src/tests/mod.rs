mod fixture;
mod reader_state;
