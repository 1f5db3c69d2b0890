mod raop_timing;
mod timing;
