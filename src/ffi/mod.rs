pub use perf_event_open_sys::bindings;

pub mod syscall;

pub type Attr = bindings::perf_event_attr;
