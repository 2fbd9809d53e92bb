#[cfg(test)]
mod control_unit_tests;
#[cfg(test)]
mod decode_tests;
#[cfg(test)]
mod program_tests;
#[cfg(test)]
mod shared_mem_tests;
