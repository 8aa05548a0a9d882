mod support;

mod test_sliding_window;
