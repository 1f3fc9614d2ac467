mod object_key_test;
