mod arbitrary;
mod property_monotonic;
mod property_repair;
