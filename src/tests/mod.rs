
mod test_render;
