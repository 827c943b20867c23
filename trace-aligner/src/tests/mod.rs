pub(crate) mod fixtures;

mod end_to_end;
