//! End-to-end tests driving the public `slipgrid` API.

mod mock_board;
mod pipeline;
